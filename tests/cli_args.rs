use clap::Parser;

use procrun::cli::{CliArgs, LogLevel};

#[test]
fn test_command_and_args_are_split() {
    let args = CliArgs::try_parse_from(["procrun", "nmap", "-T3", "--script=smb-os-discovery", "10.0.0.1"])
        .unwrap();

    assert_eq!(args.command, "nmap");
    assert_eq!(args.args, vec!["-T3", "--script=smb-os-discovery", "10.0.0.1"]);
    assert!(!args.dry_run);
    assert!(args.config.is_none());
}

#[test]
fn test_own_flags_before_command() {
    let args = CliArgs::try_parse_from([
        "procrun",
        "--config",
        "custom.toml",
        "--log-level",
        "debug",
        "--dry-run",
        "echo",
        "hi",
    ])
    .unwrap();

    assert_eq!(args.config.as_deref(), Some("custom.toml"));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.dry_run);
    assert_eq!(args.command, "echo");
    assert_eq!(args.args, vec!["hi"]);
}

#[test]
fn test_flags_after_command_belong_to_the_command() {
    let args = CliArgs::try_parse_from(["procrun", "ls", "-la", "--config", "x"]).unwrap();

    assert_eq!(args.command, "ls");
    assert_eq!(args.args, vec!["-la", "--config", "x"]);
    assert!(args.config.is_none());
}

#[test]
fn test_command_is_required() {
    assert!(CliArgs::try_parse_from(["procrun"]).is_err());
}

#[test]
fn test_log_level_flag_beats_env() {
    use procrun::logging::resolve_level;
    use tracing::Level;

    assert_eq!(resolve_level(Some(LogLevel::Warn), Some("trace")), Level::WARN);
    assert_eq!(resolve_level(None, Some(" Debug ")), Level::DEBUG);
    assert_eq!(resolve_level(None, Some("warning")), Level::WARN);
    assert_eq!(resolve_level(None, Some("loud")), Level::INFO);
    assert_eq!(resolve_level(None, None), Level::INFO);
}

#[test]
fn test_second_interrupt_forces_quit() {
    use procrun::{InterruptAction, interrupt_action};

    assert_eq!(interrupt_action(1), InterruptAction::Cancel);
    assert_eq!(interrupt_action(2), InterruptAction::ForceQuit);
    assert_eq!(interrupt_action(7), InterruptAction::ForceQuit);
}

#[test]
fn test_help_mentions_interrupt_behaviour() {
    use clap::CommandFactory;

    let help = CliArgs::command().render_help().to_string();
    assert!(help.contains("second Ctrl-C"));
}

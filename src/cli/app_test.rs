use super::*;
use crate::cli::app::usage;
use crate::core::{Error, ExecutionStyle, FilterTarget, InputMode, Splitter, StreamSource};
use crate::runtime::Strategy;
use clap::Parser;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to parse arguments without exiting the test process
pub fn parse_args<T: Parser>(args: &[&str]) -> std::result::Result<T, clap::Error> {
    T::try_parse_from(args)
}

/// Helper to validate command parsing succeeds
pub fn assert_parse_success<T: Parser>(args: &[&str]) -> T {
    match parse_args::<T>(args) {
        Ok(parsed) => parsed,
        Err(e) => panic!("Failed to parse arguments: {}", e),
    }
}

/// Helper to validate command parsing fails with expected error
pub fn assert_parse_error<T: Parser>(args: &[&str]) -> clap::Error {
    match parse_args::<T>(args) {
        Ok(_) => panic!("Expected parsing to fail but it succeeded"),
        Err(e) => e,
    }
}

fn cli(args: &[&str]) -> Cli {
    let mut full = vec!["rxargs"];
    full.extend_from_slice(args);
    assert_parse_success::<Cli>(&full)
}

fn assert_config_error(args: &[&str], fragment: &str) {
    match cli(args).validate() {
        Err(CliError::Configuration(msg)) => assert!(
            msg.contains(fragment),
            "expected '{}' in '{}'",
            fragment,
            msg
        ),
        other => panic!("expected configuration error for {:?}, got {:?}", args, other),
    }
}

#[cfg(test)]
mod parsing_tests {
    use super::*;

    #[test]
    fn test_trailing_command_keeps_hyphen_arguments() {
        let parsed = cli(&["-s", "echo", "-n", "--hi", "{}"]);
        assert!(parsed.shell);
        assert!(!parsed.dry_run);
        assert_eq!(parsed.command, vec!["echo", "-n", "--hi", "{}"]);
    }

    #[test]
    fn test_resub_takes_three_values() {
        let parsed = cli(&["--resub", "\\.jpeg$", ".jpg", "{new}", "mv", "{}", "{new}"]);
        assert_eq!(
            parsed.resub,
            Some(vec![
                "\\.jpeg$".to_string(),
                ".jpg".to_string(),
                "{new}".to_string()
            ])
        );
        assert_eq!(parsed.command, vec!["mv", "{}", "{new}"]);
    }

    #[test]
    fn test_resub_with_too_few_values_fails() {
        assert_parse_error::<Cli>(&["rxargs", "--resub", "a", "b"]);
    }

    #[test]
    fn test_mode_values() {
        assert_eq!(cli(&["-m", "abspath", "ls"]).mode, Some(InputMode::Abspath));
        assert_eq!(cli(&["--mode", "stdin", "ls"]).mode, Some(InputMode::Stdin));
        assert_parse_error::<Cli>(&["rxargs", "-m", "dir", "ls"]);
    }

    #[test]
    fn test_hidden_chunk_flags_parse() {
        let parsed = cli(&[
            "--chunk-index",
            "1",
            "--batch-file",
            "/tmp/b.json",
            "--chunks",
            "3",
            "echo",
        ]);
        assert_eq!(parsed.chunk_index, Some(1));
        assert_eq!(parsed.batch_file, Some(PathBuf::from("/tmp/b.json")));
        assert_eq!(parsed.chunks, Some(3));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_no_command_parses_empty() {
        assert!(cli(&["-n"]).command.is_empty());
    }

    #[test]
    fn test_usage_mentions_command() {
        assert!(usage().contains("COMMAND"));
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_delimiters_are_exclusive() {
        assert_config_error(&["-0", "-l", "echo"], "mutually exclusive");
        assert_config_error(&["-0", "-d", ",", "echo"], "mutually exclusive");
        assert!(cli(&["-d", ",", "echo"]).validate().is_ok());
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        assert_config_error(&["-d", "", "echo"], "must not be empty");
    }

    #[test]
    fn test_empty_placeholders_rejected() {
        assert_config_error(&["-I", "", "echo", "ab"], "--replace-str must not be empty");
        assert_config_error(
            &["--resub", "a", "b", "", "echo"],
            "--resub placeholder must not be empty",
        );
        assert!(cli(&["--resub", "a", "b", "{new}", "echo"]).validate().is_ok());
    }

    #[test]
    fn test_split_and_groups_are_exclusive() {
        assert_config_error(&["--split", ",", "--groups", "(.)", "echo"], "--split and --groups");
    }

    #[test]
    fn test_base_dir_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, "").unwrap();
        assert_config_error(&["-b", file.to_str().unwrap(), "echo"], "not a directory");
        assert!(cli(&["-b", temp.path().to_str().unwrap(), "echo"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_interactive_with_pool_rejected() {
        assert_config_error(&["-p", "-P", "4", "echo"], "--interactive");
        assert!(cli(&["-p", "-P", "1", "echo"]).validate().is_ok());
    }

    #[test]
    fn test_chunk_rules() {
        assert_config_error(&["--chunks", "0", "echo"], "greater than zero");
        assert_config_error(&["--chunks", "2", "-P", "3", "echo"], "--max-procs");
        assert_config_error(&["--chunk-index", "0", "echo"], "requires --chunks");
        assert_config_error(&["--chunks", "2", "--chunk-index", "2", "echo"], "out of range");
        assert_config_error(&["--no-mux", "echo"], "requires --chunks");
        assert_config_error(&["--chunks", "2", "--batch-file", "/tmp/x", "echo"], "requires --chunk-index");
    }

    #[test]
    fn test_interactive_chunks_prompt_only_in_windows() {
        assert!(cli(&["--chunks", "2", "-p", "echo"]).validate().is_ok());
        assert!(cli(&["--chunks", "2", "--no-mux", "--chunk-index", "1", "-p", "echo"])
            .validate()
            .is_ok());
        assert_config_error(&["--chunks", "2", "--no-mux", "-p", "echo"], "--chunk-index");
    }
}

#[cfg(test)]
mod strategy_tests {
    use super::*;

    fn strategy(args: &[&str]) -> Strategy {
        let parsed = cli(args);
        let config = Config::default().merge_with_cli_args(&parsed);
        parsed.strategy(&config)
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(strategy(&["echo"]), Strategy::Sequential);
        assert_eq!(strategy(&["-P", "1", "echo"]), Strategy::Sequential);
        assert_eq!(strategy(&["-p", "echo"]), Strategy::Interactive);
        assert_eq!(strategy(&["-P", "4", "echo"]), Strategy::WorkerPool(4));
        assert_eq!(strategy(&["--chunks", "3", "echo"]), Strategy::MultiplexedChunks(3));
        assert_eq!(
            strategy(&["--chunks", "3", "-p", "echo"]),
            Strategy::MultiplexedChunks(3)
        );
    }

    #[test]
    fn test_config_pool_size_applies() {
        let parsed = cli(&["echo"]);
        let config = Config {
            max_procs: 3,
            ..Config::default()
        };
        assert_eq!(parsed.strategy(&config), Strategy::WorkerPool(3));
    }
}

#[cfg(test)]
mod builder_config_tests {
    use super::*;

    fn builder_config(args: &[&str]) -> crate::core::BuilderConfig {
        let parsed = cli(args);
        let config = Config::default().merge_with_cli_args(&parsed);
        parsed
            .builder_config(InputMode::File, std::path::Path::new("/base"), &config)
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = builder_config(&["echo"]);
        assert!(config.filter.is_none());
        assert!(config.resub.is_none());
        assert!(config.format.is_none());
        assert_eq!(config.replace_str, "{}");
        assert_eq!(config.style, ExecutionStyle::ArgVector);
    }

    #[test]
    fn test_filter_flags() {
        let config = builder_config(&["-r", "\\.py$", "-o", "-f", "echo"]);
        let filter = config.filter.unwrap();
        assert!(filter.omit);
        assert_eq!(filter.target, FilterTarget::Basename);
        assert!(filter.regex.is_match("a.py"));
    }

    #[test]
    fn test_format_variants() {
        assert!(matches!(
            builder_config(&["--format", "echo"]).format,
            Some(Splitter::Whole)
        ));
        assert!(matches!(
            builder_config(&["--split", "_", "echo"]).format,
            Some(Splitter::Split(_))
        ));
        assert!(matches!(
            builder_config(&["--groups", "(\\w+)\\.(\\w+)", "echo"]).format,
            Some(Splitter::Groups(_))
        ));
    }

    #[test]
    fn test_shell_style_and_replace_str() {
        let config = builder_config(&["-s", "-I", "%", "--max-chars", "40", "echo"]);
        assert_eq!(config.style, ExecutionStyle::ShellString);
        assert_eq!(config.replace_str, "%");
        assert_eq!(config.max_chars, Some(40));
    }

    #[test]
    fn test_resub_compiled() {
        let config = builder_config(&["--resub", "\\.jpeg$", ".jpg", "{new}", "mv"]);
        let resub = config.resub.unwrap();
        assert_eq!(resub.placeholder, "{new}");
        assert_eq!(resub.replacement, ".jpg");
        assert!(resub.pattern.is_match("a.jpeg"));
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let parsed = cli(&["-r", "(unclosed", "echo"]);
        let result =
            parsed.builder_config(InputMode::File, std::path::Path::new("/"), &Config::default());
        assert!(matches!(result, Err(CliError::Core(Error::Regex(_)))));
    }
}

#[cfg(test)]
mod mode_resolution_tests {
    use super::*;

    #[test]
    fn test_stream_flags_imply_stdin() {
        let (mode, source) = cli(&["-a", "items.txt", "echo"]).resolve_mode().unwrap();
        assert_eq!(mode, InputMode::Stdin);
        assert!(matches!(source, StreamSource::File(p) if p == PathBuf::from("items.txt")));

        let (mode, _) = cli(&["-m", "file", "-d", ",", "echo"]).resolve_mode().unwrap();
        assert_eq!(mode, InputMode::Stdin);

        let (mode, _) = cli(&["-E", "END", "echo"]).resolve_mode().unwrap();
        assert_eq!(mode, InputMode::Stdin);
    }

    #[test]
    fn test_explicit_walk_mode() {
        let (mode, source) = cli(&["-m", "path", "echo"]).resolve_mode().unwrap();
        assert_eq!(mode, InputMode::Path);
        assert!(matches!(source, StreamSource::Stdin));
    }
}

#[cfg(test)]
mod execute_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_command() {
        let result = cli(&["-n"]).execute().await;
        assert!(matches!(result, Err(CliError::NoCommand)));
    }

    #[tokio::test]
    async fn test_validation_runs_before_enumeration() {
        let result = cli(&["-a", "/definitely/missing", "-0", "-l", "echo"]).execute().await;
        assert!(matches!(result, Err(CliError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_item_file_is_enumeration_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.txt");
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "").unwrap();
        let result = cli(&[
            "--config",
            config.to_str().unwrap(),
            "-a",
            missing.to_str().unwrap(),
            "echo",
        ])
        .execute()
        .await;
        assert!(matches!(result, Err(CliError::Core(Error::Enumeration(_)))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_walk_runs_in_entry_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/data.txt"), "").unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "").unwrap();

        let result = cli(&[
            "--config",
            config.to_str().unwrap(),
            "-m",
            "file",
            "-b",
            temp.path().to_str().unwrap(),
            "-r",
            "data",
            "-s",
            "cp {} {}.copy",
        ])
        .execute()
        .await;

        assert!(result.is_ok());
        assert!(temp.path().join("sub/data.txt.copy").exists());
    }
}

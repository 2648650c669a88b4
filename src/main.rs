use anyhow::Context;
use clap::{Parser, Subcommand};
use mountopts::codec;
use mountopts::config::Config;
use mountopts::{OptionValue, RawUserOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mountopts", version, about = "Resolve and encode mount options")]
struct Cli {
    /// Configuration file with mask profiles
    #[arg(long, env = "MOUNTOPTS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a profile's mask to user options and print the kernel option string
    Resolve {
        #[arg(long)]
        profile: String,

        /// Options in `key=value,flag` form; may be repeated
        #[arg(short = 'o', long = "options")]
        options: Vec<String>,

        /// Typed options as a JSON object, merged over `-o`
        #[arg(long)]
        input_json: Option<String>,
    },

    /// Encode a JSON object of string options as a kernel option string
    Encode {
        #[arg(long)]
        input_json: String,
    },

    /// Decode a kernel option string into JSON
    Decode {
        option_string: String,

        #[arg(long, default_value = codec::DEFAULT_SEPARATOR)]
        separator: String,
    },

    /// List configured profiles and any policy inconsistencies
    Profiles,
}

/// What a command produced: text for stdout, or a rejection report for stderr.
#[derive(Debug, PartialEq, Eq)]
enum Output {
    Printed(String),
    Rejected(String),
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mountopts=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli)? {
        Output::Printed(text) => {
            print!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
        Output::Rejected(report) => {
            eprint!("{}", report);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<Output> {
    match cli.command {
        Command::Resolve { profile, options, input_json } => {
            let config = load_config(cli.config.as_ref())?;
            resolve_options(&config, &profile, &options, input_json.as_deref())
        }
        Command::Encode { input_json } => encode_json(&input_json).map(Output::Printed),
        Command::Decode { option_string, separator } => {
            decode_to_json(&option_string, &separator).map(Output::Printed)
        }
        Command::Profiles => {
            let config = load_config(cli.config.as_ref())?;
            list_profiles(&config).map(Output::Printed)
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => Config::load()?,
    };
    tracing::debug!(profiles = config.profiles.len(), "configuration loaded");
    Ok(config)
}

/// Collect user options from `-o` strings, then overlay typed `--input-json` values.
fn gather_user_opts(
    options: &[String],
    input_json: Option<&str>,
) -> anyhow::Result<RawUserOptions> {
    let mut user_opts = RawUserOptions::new();
    for option_string in options {
        for (key, value) in codec::decode(option_string, codec::DEFAULT_SEPARATOR) {
            user_opts.insert(key, OptionValue::String(value));
        }
    }

    if let Some(json) = input_json {
        let typed: RawUserOptions =
            serde_json::from_str(json).context("Invalid --input-json object")?;
        user_opts.extend(typed);
    }

    Ok(user_opts)
}

fn resolve_options(
    config: &Config,
    profile: &str,
    options: &[String],
    input_json: Option<&str>,
) -> anyhow::Result<Output> {
    let mask = config.build_mask(profile)?;
    let user_opts = gather_user_opts(options, input_json)?;

    match mask.resolve(&user_opts) {
        Ok(resolved) => Ok(Output::Printed(format!("{}\n", codec::encode(&resolved)))),
        Err(err) => {
            tracing::info!(profile, violations = err.violations().len(), "options rejected");
            Ok(Output::Rejected(err.to_string()))
        }
    }
}

fn encode_json(input_json: &str) -> anyhow::Result<String> {
    let opts: BTreeMap<String, String> =
        serde_json::from_str(input_json).context("Invalid --input-json object")?;
    Ok(format!("{}\n", codec::encode(&opts)))
}

fn decode_to_json(option_string: &str, separator: &str) -> anyhow::Result<String> {
    let opts = codec::decode(option_string, separator);
    Ok(format!("{}\n", serde_json::to_string_pretty(&opts)?))
}

fn list_profiles(config: &Config) -> anyhow::Result<String> {
    let mut text = String::new();
    for name in config.profiles.keys() {
        let mask = config.build_mask(name)?;
        text.push_str(&format!("{}\n", name));
        for issue in mask.consistency_issues() {
            text.push_str(&format!("  warning: {}\n", issue));
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mountopts::config::ProfileConfig;

    fn nfs_config() -> Config {
        let nfs = ProfileConfig {
            allowed: vec!["uid".into(), "gid".into(), "readonly".into(), "retrans".into()],
            mandatory: vec!["uid".into()],
            key_permutations: BTreeMap::from([("ro".to_string(), "readonly".to_string())]),
            ..Default::default()
        };
        let smb = ProfileConfig {
            allowed: vec!["username".into()],
            mandatory: vec!["username".into(), "domain".into()],
            ..Default::default()
        };

        Config { profiles: BTreeMap::from([("nfs".to_string(), nfs), ("smb".to_string(), smb)]) }
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_gather_merges_option_strings() {
        let opts = gather_user_opts(&args(&["uid=1000,ro", "gid=50"]), None).unwrap();

        assert_eq!(opts.len(), 3);
        assert_eq!(opts.get("uid"), Some(&OptionValue::from("1000")));
        assert_eq!(opts.get("ro"), Some(&OptionValue::from("")));
        assert_eq!(opts.get("gid"), Some(&OptionValue::from("50")));
    }

    #[test]
    fn test_gather_json_values_win_over_option_strings() {
        let json = r#"{"uid": 0, "readonly": true}"#;
        let opts = gather_user_opts(&args(&["uid=1000,gid=50"]), Some(json)).unwrap();

        assert_eq!(opts.get("uid"), Some(&OptionValue::Integer(0)));
        assert_eq!(opts.get("readonly"), Some(&OptionValue::Bool(true)));
        assert_eq!(opts.get("gid"), Some(&OptionValue::from("50")));
    }

    #[test]
    fn test_gather_rejects_malformed_json() {
        let err = gather_user_opts(&[], Some("[1, 2]")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid --input-json object");
    }

    #[test]
    fn test_resolve_prints_kernel_string() {
        let output = resolve_options(
            &nfs_config(),
            "nfs",
            &args(&["uid=1000,ro"]),
            Some(r#"{"retrans": "003"}"#),
        )
        .unwrap();

        assert_eq!(output, Output::Printed("readonly,retrans=3,uid=1000\n".to_string()));
    }

    #[test]
    fn test_resolve_rejection_keeps_report_verbatim() {
        let output = resolve_options(&nfs_config(), "nfs", &args(&["bogus=1"]), None).unwrap();

        assert_eq!(
            output,
            Output::Rejected(
                "- Not allowed options: bogus\n- Missing mandatory options: uid\n".to_string()
            )
        );
    }

    #[test]
    fn test_resolve_unknown_profile_is_an_error() {
        let err = resolve_options(&nfs_config(), "cifs", &[], None).unwrap_err();
        assert_eq!(err.to_string(), "Unknown profile: cifs");
    }

    #[test]
    fn test_encode_json() {
        let text = encode_json(r#"{"uid": "0042", "ro": "", "sec": "sys"}"#).unwrap();
        assert_eq!(text, "ro,sec=sys,uid=42\n");
    }

    #[test]
    fn test_encode_rejects_typed_values() {
        assert!(encode_json(r#"{"uid": 42}"#).is_err());
    }

    #[test]
    fn test_decode_to_json() {
        let text = decode_to_json("uid:1000,ro", ":").unwrap();
        assert_eq!(text, "{\n  \"ro\": \"\",\n  \"uid\": \"1000\"\n}\n");
    }

    #[test]
    fn test_list_profiles_reports_issues() {
        let text = list_profiles(&nfs_config()).unwrap();
        assert_eq!(
            text,
            "nfs\nsmb\n  warning: mandatory option domain is neither allowed nor defaulted\n"
        );
    }

    #[test]
    fn test_cli_collects_repeated_options() {
        let cli = Cli::try_parse_from([
            "mountopts",
            "resolve",
            "--profile",
            "nfs",
            "-o",
            "uid=1000",
            "--options",
            "ro",
        ])
        .unwrap();

        match cli.command {
            Command::Resolve { profile, options, input_json } => {
                assert_eq!(profile, "nfs");
                assert_eq!(options, vec!["uid=1000", "ro"]);
                assert!(input_json.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_decode_default_separator() {
        let cli = Cli::try_parse_from(["mountopts", "decode", "a=1"]).unwrap();
        match cli.command {
            Command::Decode { separator, .. } => assert_eq!(separator, "="),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use skinsight_core::{Concern, SkinTone};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AnalyzeArgs {
    pub(crate) image: PathBuf,
    pub(crate) age: Option<u32>,
    pub(crate) skin_tone: SkinTone,
    pub(crate) concerns: BTreeSet<Concern>,
    pub(crate) consent: bool,
    pub(crate) endpoint: Option<String>,
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CliCommand {
    Analyze(AnalyzeArgs),
    Options,
}

/// Short command-line key for a concern: the first word of its label
pub(crate) fn concern_key(concern: Concern) -> String {
    concern
        .label()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Accepts either the full label or its short key
pub(crate) fn parse_concern(s: &str) -> Result<Concern, String> {
    let wanted = s.trim();
    if let Some(concern) = Concern::ALL
        .into_iter()
        .find(|c| concern_key(*c).eq_ignore_ascii_case(wanted))
    {
        return Ok(concern);
    }
    wanted.parse::<Concern>().map_err(|e| e.to_string())
}

pub(crate) fn command() -> Command {
    Command::new("skinsight")
        .version(skinsight_core::VERSION)
        .about("Guided skin intake: questionnaire, image and automated analysis")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Log output format on stderr"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Submit one image with questionnaire answers for analysis")
                .arg(
                    Arg::new("image")
                        .long("image")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Image file to upload"),
                )
                .arg(
                    Arg::new("age")
                        .long("age")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Age in years"),
                )
                .arg(
                    Arg::new("skin-tone")
                        .long("skin-tone")
                        .ignore_case(true)
                        .value_parser(SkinTone::ALL.map(SkinTone::as_str))
                        .default_value(SkinTone::default().as_str())
                        .help("Self-reported skin tone"),
                )
                .arg(
                    Arg::new("concern")
                        .long("concern")
                        .action(ArgAction::Append)
                        .value_parser(parse_concern)
                        .help("Main concern; repeat for several (see `skinsight options`)"),
                )
                .arg(
                    Arg::new("consent")
                        .long("consent")
                        .action(ArgAction::SetTrue)
                        .help("Consent to automated analysis of the image"),
                )
                .arg(
                    Arg::new("endpoint")
                        .long("endpoint")
                        .help("Analysis endpoint URL; overrides the config file"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        )
        .subcommand(Command::new("options").about("List skin tones and concerns"))
}

pub(crate) fn log_format(matches: &ArgMatches) -> LogFormat {
    // globals are read where they were matched
    let args = matches.subcommand().map_or(matches, |(_, sub)| sub);
    match args.get_one::<String>("log-format").map(String::as_str) {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

pub(crate) fn parse(matches: &ArgMatches) -> anyhow::Result<CliCommand> {
    match matches.subcommand() {
        Some(("analyze", args)) => {
            let image = args
                .get_one::<PathBuf>("image")
                .cloned()
                .context("--image is required")?;
            let skin_tone = match args.get_one::<String>("skin-tone") {
                Some(tone) => tone.parse()?,
                None => SkinTone::default(),
            };
            let concerns = args
                .get_many::<Concern>("concern")
                .map(|values| values.copied().collect())
                .unwrap_or_default();

            Ok(CliCommand::Analyze(AnalyzeArgs {
                image,
                age: args.get_one::<u32>("age").copied(),
                skin_tone,
                concerns,
                consent: args.get_flag("consent"),
                endpoint: args.get_one::<String>("endpoint").cloned(),
                config: args.get_one::<PathBuf>("config").cloned(),
            }))
        }
        Some(("options", _)) => Ok(CliCommand::Options),
        Some((other, _)) => anyhow::bail!("unknown command {other}"),
        None => anyhow::bail!("no command given"),
    }
}

/// Text printed by `skinsight options`
pub(crate) fn options_text() -> String {
    let mut out = String::from("Skin tones:\n");
    for tone in SkinTone::ALL {
        out.push_str(&format!("  {tone}\n"));
    }
    out.push_str("Concerns:\n");
    for concern in Concern::ALL {
        out.push_str(&format!("  {:<14}{}\n", concern_key(concern), concern.label()));
    }
    out
}

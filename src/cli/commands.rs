use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// End-to-end tester for Cloud Run samples
#[derive(Parser, Debug)]
#[command(
    name = "sst",
    about = "End-to-end tester for Cloud Run samples",
    version,
    author,
    long_about = "sst builds and deploys a sample to Cloud Run using the commands its \
                  cloudbuild.yaml or README describes, checks the deployed service's \
                  endpoints, and deletes everything it created."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Show debug output")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build, deploy, check and tear down a sample",
        long_about = "Resolves the sample's build and deploy commands, runs them, checks the \
                      deployed service, then deletes the service and its container image.\n\n\
                      Examples:\n  \
                      sst run run/hello\n  \
                      sst run --log-level debug run/hello"
    )]
    Run(RunArgs),

    #[command(
        about = "Show the build and deploy commands for a sample without running them",
        long_about = "Resolves the sample's build and deploy commands and prints them along \
                      with where they came from. Nothing is executed.\n\n\
                      Examples:\n  \
                      sst plan run/hello\n  \
                      sst plan run/hello --format json\n  \
                      sst plan run/hello --service-name hello-test --image gcr.io/my-project/hello"
    )]
    Plan(PlanArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(value_name = "SAMPLE_DIR", help = "Path to the sample directory")]
    pub sample_dir: PathBuf,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    #[arg(value_name = "SAMPLE_DIR", help = "Path to the sample directory")]
    pub sample_dir: PathBuf,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    #[arg(
        long,
        value_name = "NAME",
        help = "Cloud Run service name to use instead of a generated one"
    )]
    pub service_name: Option<String>,

    #[arg(
        long,
        value_name = "URL",
        help = "Container image URL to use instead of one derived from the project and commit"
    )]
    pub image: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_run_command() {
        let args = CliArgs::parse_from(["sst", "run", "run/hello"]);
        match args.command {
            Commands::Run(run_args) => {
                assert_eq!(run_args.sample_dir, PathBuf::from("run/hello"));
                assert!(run_args.overrides.service_name.is_none());
                assert!(run_args.overrides.image.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_requires_sample_dir() {
        assert!(CliArgs::try_parse_from(["sst", "run"]).is_err());
    }

    #[test]
    fn test_default_plan_args() {
        let args = CliArgs::parse_from(["sst", "plan", "run/hello"]);
        match args.command {
            Commands::Plan(plan_args) => {
                assert_eq!(plan_args.format, OutputFormatArg::Human);
                assert!(plan_args.overrides.service_name.is_none());
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_plan_with_options() {
        let args = CliArgs::parse_from([
            "sst",
            "plan",
            "run/hello",
            "--format",
            "json",
            "--service-name",
            "svc-x",
            "--image",
            "gcr.io/p/tag",
        ]);

        match args.command {
            Commands::Plan(plan_args) => {
                assert_eq!(plan_args.format, OutputFormatArg::Json);
                assert_eq!(plan_args.overrides.service_name, Some("svc-x".to_string()));
                assert_eq!(plan_args.overrides.image, Some("gcr.io/p/tag".to_string()));
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["sst", "-v", "plan", "x"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["sst", "plan", "x", "-q"]);
        assert!(args.quiet);

        let args = CliArgs::parse_from(["sst", "--log-level", "debug", "run", "x"]);
        assert_eq!(args.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(CliArgs::try_parse_from(["sst", "-v", "-q", "plan", "x"]).is_err());
    }
}

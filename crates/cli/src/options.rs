//! Command-line options.
//!
//! Built with the clap builder API; [`ShellOptions::from_matches`] turns the
//! matches into plain values so the rest of the binary never sees clap.

use std::path::{Path, PathBuf};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Environment variable naming the default home directory
pub const HOME_ENV: &str = "DOCSHELL_HOME";

/// Build the clap command
pub fn build_cli() -> Command {
    Command::new("docshell")
        .about("Interactive shell for docshell document stores")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("home")
                .short('H')
                .long("home")
                .value_name("DIR")
                .help("Environment home directory (default: $DOCSHELL_HOME, else the current directory)"),
        )
        .arg(
            Arg::new("script")
                .short('s')
                .long("script")
                .value_name("FILE")
                .help("Run a script file and exit"),
        )
        .arg(
            Arg::new("transactional")
                .short('t')
                .long("transactional")
                .help("Enable transactions")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("create")
                .short('c')
                .long("create")
                .help("Create the home directory when it does not exist")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .value_name("PASSWORD")
                .help("Encrypt the environment with this password"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output and per-command timing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("size")
                .short('z')
                .long("size")
                .value_name("MB")
                .help("Cache size in megabytes")
                .value_parser(value_parser!(u64)),
        )
}

/// Parsed process options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    pub home: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub transactional: bool,
    pub create: bool,
    pub password: Option<String>,
    pub verbose: bool,
    pub cache_size_mb: Option<u64>,
}

impl ShellOptions {
    /// Extract options from clap matches
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            home: matches.get_one::<String>("home").map(PathBuf::from),
            script: matches.get_one::<String>("script").map(PathBuf::from),
            transactional: matches.get_flag("transactional"),
            create: matches.get_flag("create"),
            password: matches.get_one::<String>("password").cloned(),
            verbose: matches.get_flag("verbose"),
            cache_size_mb: matches.get_one::<u64>("size").copied(),
        }
    }
}

/// Pick the home directory: the flag, then the environment, then `cwd`
///
/// A relative result is joined to `cwd`.
pub fn resolve_home(explicit: Option<&Path>, env: Option<&str>, cwd: &Path) -> PathBuf {
    let chosen = explicit
        .map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| cwd.to_path_buf());
    if chosen.is_absolute() {
        chosen
    } else {
        cwd.join(chosen)
    }
}

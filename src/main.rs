//! Backend CLI - dispatch one request through a Backend application.
//!
//! ```text
//! backend home/read.json
//! backend blog/show/12 --format json
//! backend posts --method POST --accept application/json --project ./site
//! ```

use backend::backend_config::{Config, ConfigError, SiteState};
use backend::logging::{LogConfig, LogFormat, LogOutput};
use backend::{Application, Kernel, Request};
use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Dispatch a request through a Backend application and print the result
#[derive(Parser, Debug)]
#[command(name = "backend")]
#[command(version)]
#[command(about = "Dispatch a request through a Backend application")]
struct Cli {
    /// Request path and query, e.g. `home/read.json?page=2`
    #[arg(default_value = "")]
    query: String,

    /// Request method
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Explicit output format
    #[arg(short, long)]
    format: Option<String>,

    /// Accept header sent with the request
    #[arg(long)]
    accept: Option<String>,

    /// Project folder holding `configs/` and `views/`
    #[arg(short, long, default_value = ".", env = "BACKEND_PROJECT")]
    project: PathBuf,

    /// Site state: development or production
    #[arg(long, env = "BACKEND_SITE_STATE")]
    site_state: Option<String>,

    /// Views folder, defaults to `<project>/views` when present
    #[arg(long)]
    views: Option<PathBuf>,

    /// Emit framework debug events on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    backend_log::init();
    LogConfig::for_debug_level(if cli.verbose { 5 } else { 2 })
        .format(LogFormat::Compact)
        .output(LogOutput::Stderr)
        .init();

    let site_state = match site_state(cli.site_state.as_deref()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let config = match load_config(&cli.project, site_state) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let kernel = Kernel::with_defaults();
    let views = cli.views.clone().unwrap_or_else(|| cli.project.join("views"));
    if cli.views.is_some() || views.is_dir() {
        match kernel.views.load_dir(&views) {
            Ok(count) => backend_log::debug!("Loaded {} view descriptors", count),
            Err(e) => backend_log::warn!("{}", e),
        }
    }

    let request = match build_request(&cli) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let app = Application::new(&kernel, config, request);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = app.run(&mut out);
    if let Err(e) = out.write_all(b"\n").and_then(|()| out.flush()) {
        backend_log::warn!("Could not write to stdout: {}", e);
    }
    app.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(fault) => {
            eprintln!("{}", fault);
            ExitCode::FAILURE
        }
    }
}

fn site_state(flag: Option<&str>) -> Result<SiteState, ConfigError> {
    match flag {
        Some(state) => state.parse(),
        None => Config::site_state_from_env(),
    }
}

/// Discovered configuration, or defaults when the project has none.
fn load_config(project: &Path, site_state: SiteState) -> Result<Config, ConfigError> {
    let config = match Config::discover(project, site_state) {
        Ok(config) => config,
        Err(ConfigError::NotFound(folder)) => {
            backend_log::info!("No configuration file in {}, using defaults", folder);
            Config::new(site_state)
        }
        Err(e) => return Err(e),
    };

    let env_file = project.join(".env");
    if env_file.is_file() {
        config.load_dotenv(Some(&env_file))?;
    }
    Ok(config)
}

fn build_request(cli: &Cli) -> Result<Request, backend::Error> {
    let uri = match &cli.format {
        Some(format) => {
            let separator = if cli.query.contains('?') { '&' } else { '?' };
            format!(
                "{}{}format={}",
                cli.query,
                separator,
                urlencoding::encode(format)
            )
        }
        None => cli.query.clone(),
    };

    let request = Request::from_uri(&cli.method, &uri)?;
    Ok(match &cli.accept {
        Some(accept) => request.with_accept(accept.clone()),
        None => request,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["backend"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_build_request_with_format() {
        let request = build_request(&cli(&["home/read", "--format", "json"])).unwrap();
        assert_eq!(request.query(), "home/read");
        assert_eq!(request.specified_format(), Some("json"));

        let request = build_request(&cli(&["home?page=2", "-f", "cli"])).unwrap();
        assert_eq!(request.parameter("page"), Some("2"));
        assert_eq!(request.specified_format(), Some("cli"));
    }

    #[test]
    fn test_build_request_rejects_method() {
        assert!(build_request(&cli(&["home", "--method", "UPDATE"])).is_err());
    }

    #[test]
    fn test_load_config_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path(), SiteState::Development).unwrap();
        assert_eq!(config.site_state(), SiteState::Development);
        assert!(config.source().is_none());
    }

    #[test]
    fn test_site_state_flag() {
        assert_eq!(site_state(Some("development")).unwrap(), SiteState::Development);
        assert!(site_state(Some("staging")).is_err());
    }
}

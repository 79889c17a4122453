use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use qayeq_autocomplete::completion::{CompletionController, CompletionResult, HttpTransport};
use qayeq_autocomplete::config;
use qayeq_autocomplete::history::HistoryDatabase;
use qayeq_autocomplete::settings::Settings;
use qayeq_autocomplete::url_bar::AutocompleteInput;
use qayeq_autocomplete::{Error, Result};
use url::Url;

/// Command-line arguments accepted by the `qayeq-autocomplete` binary.
#[derive(Parser, Debug)]
#[command(
    name = "qayeq-autocomplete",
    version,
    about = "Address bar autocomplete for the qayeq browser"
)]
pub(crate) struct CliArgs {
    #[arg(
        short,
        long,
        value_name = "DIR",
        global = true,
        help = "Profile directory holding the history database (default: platform data dir)"
    )]
    pub(crate) profile: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "DIR",
        global = true,
        help = "Directory containing settings.toml (default: platform config dir)"
    )]
    pub(crate) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Show how typed text is classified
    Classify {
        text: String,
        #[arg(long, value_name = "TLD", default_value = "")]
        desired_tld: String,
    },
    /// Print completions for typed text
    Complete {
        text: String,
        #[arg(long, value_name = "TLD", default_value = "")]
        desired_tld: String,
        #[arg(long, help = "Never complete inline")]
        prevent_inline: bool,
        #[arg(long, help = "Only run work that finishes without waiting")]
        sync: bool,
        #[arg(long, value_name = "MS", default_value_t = 3000)]
        timeout_ms: u64,
    },
    /// Record a visit to a URL
    Visit {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, help = "The URL was typed into the address bar")]
        typed: bool,
        #[arg(long, value_name = "URL", help = "The visit redirected through these URLs")]
        redirect_to: Vec<String>,
    },
    /// Bookmark a URL
    Bookmark { url: String, title: String },
}

pub(crate) fn run(args: CliArgs) -> Result<()> {
    let settings = match args.config.or_else(Settings::default_dir) {
        Some(dir) => Settings::load(&dir)?,
        None => Settings::default(),
    };

    match args.command {
        Command::Classify { text, desired_tld } => {
            let input =
                AutocompleteInput::new(&text, &desired_tld, false, false, &settings.external_protocols);
            println!("type:   {:?}", input.input_type());
            println!("scheme: {}", input.scheme());
            println!("text:   {}", input.text());
            Ok(())
        }
        Command::Complete {
            text,
            desired_tld,
            prevent_inline,
            sync,
            timeout_ms,
        } => {
            let history = open_history(args.profile)?;
            let transport = HttpTransport::new(Duration::from_millis(config::SUGGEST_TIMEOUT_MS))?;
            let mut controller =
                CompletionController::new(&settings, Some(history), Arc::new(transport))?;

            let input = controller.make_input(&text, &desired_tld, prevent_inline, sync);
            controller.start(input, false);
            let mut listener = |result: &CompletionResult, _: bool, done: bool| {
                log::debug!("{} matches, done: {}", result.len(), done);
            };
            if !controller.run_until_done(Duration::from_millis(timeout_ms), &mut listener) {
                log::warn!("Some providers did not finish within {} ms", timeout_ms);
                controller.stop(false);
            }

            print_result(controller.result());
            Ok(())
        }
        Command::Visit {
            url,
            title,
            typed,
            redirect_to,
        } => {
            let history = open_history(args.profile)?;
            let url = parse_url(&url)?;
            let mut chain = vec![url.clone()];
            for hop in &redirect_to {
                chain.push(parse_url(hop)?);
            }

            // the visit lands on the end of the chain
            let landed = chain.last().unwrap_or(&url);
            history.record_visit(landed, title.as_deref(), typed)?;
            if chain.len() > 1 {
                history.record_visit(&url, None, typed)?;
                history.record_redirects(&chain)?;
            }
            println!("Recorded visit to {}", landed);
            Ok(())
        }
        Command::Bookmark { url, title } => {
            let history = open_history(args.profile)?;
            let url = parse_url(&url)?;
            history.add_bookmark(&url, &title)?;
            println!("Bookmarked {}", url);
            Ok(())
        }
    }
}

fn open_history(profile: Option<PathBuf>) -> Result<Arc<HistoryDatabase>> {
    let dir = profile
        .or_else(Settings::default_profile_dir)
        .ok_or_else(|| Error::Unavailable("no profile directory".into()))?;
    std::fs::create_dir_all(&dir)?;
    Ok(Arc::new(HistoryDatabase::new(&dir)?))
}

fn parse_url(text: &str) -> Result<Url> {
    Url::parse(text).map_err(|e| Error::InvalidUrl(format!("{}: {}", text, e)))
}

fn print_result(result: &CompletionResult) {
    let default = result.default_index();
    for (index, item) in result.iter().enumerate() {
        let marker = if Some(index) == default { '*' } else { ' ' };
        println!(
            "{} {:>5}  {:<22} {}",
            marker,
            item.relevance,
            format!("{:?}", item.completion_type),
            item.contents
        );
        if !item.description.is_empty() {
            println!("{:>31}{}", "", item.description);
        }
    }
}

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Input, Select};

use natal::config::Config;
use natal::error::{NatalError, SubmitError};
use natal::form::{validate, BirthForm};
use natal::geocoding::{GeoapifyClient, Geocoder};
use natal::report::{ReportRequester, ReportSink};
use natal::resolver::{Key, PlaceResolver};
use natal::types::{Place, Suggestion};

#[derive(Parser)]
#[command(name = "natal")]
#[command(version = "0.1.0")]
#[command(about = "Collects birth data and requests a report from a webhook", long_about = None)]
struct Cli {
    #[arg(long)]
    name: Option<String>,
    /// dd/mm/aaaa or aaaa-mm-dd
    #[arg(long)]
    date: Option<String>,
    /// HH:MM, 24h
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    email: Option<String>,
    /// City to search for
    #[arg(long)]
    place: Option<String>,
    /// Pick the n-th suggestion (1-based) instead of asking
    #[arg(long)]
    pick: Option<usize>,
    /// Overrides REPORT_WEBHOOK_URL
    #[arg(long)]
    webhook: Option<String>,
    /// Directory for HTML and PDF reports
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match failure_message(&e) {
                Some(message) => eprintln!("{message}"),
                None => log::debug!("Submission ended with: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Cli) -> Result<(), NatalError> {
    let mut config = Config::from_env()?;
    if let Some(url) = &args.webhook {
        config = config.with_webhook_url(url)?;
    }
    let requester = ReportRequester::new(&config)?;
    let mut resolver = PlaceResolver::new(GeoapifyClient::new(&config))
        .on_place_change(|place| log::debug!("Place changed: {:?}", place.map(|p| &p.city)));

    // same clock as the submission, so both agree on what "today" is
    let form = fill_form(args, Local::now().date_naive())?;
    let place = choose_place(&mut resolver, args).await?;

    let mut sink = FileSink::new(args.out.clone());
    match requester.submit(&form, Some(&place), &mut sink).await {
        Ok(_) => sink.finish(),
        Err(SubmitError::Invalid(errors)) => {
            for field in errors.fields() {
                eprintln!("{}: {}", field_label(field), errors.get(field).unwrap_or_default());
            }
            Err(SubmitError::Invalid(errors).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// What to print on exit. Submission errors were already shown, either as
/// field messages or through the sink's alert.
fn failure_message(error: &NatalError) -> Option<String> {
    match error {
        NatalError::Submit(_) => None,
        other => Some(other.to_string()),
    }
}

fn field_label(field: &str) -> &'static str {
    match field {
        "full_name" => "Nome completo",
        "birth_date" => "Data de nascimento (dd/mm/aaaa)",
        "birth_time" => "Hora de nascimento (HH:MM)",
        "email" => "E-mail",
        _ => "Cidade de nascimento",
    }
}

/// Takes what the flags provide and asks for every field still invalid.
fn fill_form(args: &Cli, today: NaiveDate) -> Result<BirthForm, NatalError> {
    let mut form = BirthForm::new(
        args.name.as_deref().unwrap_or_default(),
        args.date.as_deref().unwrap_or_default(),
        args.time.as_deref().unwrap_or_default(),
        args.email.as_deref().unwrap_or_default(),
    );
    loop {
        // the place is chosen afterwards
        let errors = validate(&form, None, today);
        let invalid: Vec<&'static str> = errors.fields().filter(|f| *f != "place").collect();
        if invalid.is_empty() {
            return Ok(form);
        }
        for field in invalid {
            let current = match field {
                "full_name" => &mut form.full_name,
                "birth_date" => &mut form.birth_date,
                "birth_time" => &mut form.birth_time,
                _ => &mut form.email,
            };
            if !current.is_empty() {
                eprintln!("{}", errors.get(field).unwrap_or_default());
            }
            let value = Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(field_label(field))
                .allow_empty(true)
                .interact_text()?;
            *current = value.trim().to_string();
        }
    }
}

async fn choose_place<G: Geocoder>(
    resolver: &mut PlaceResolver<G>,
    args: &Cli,
) -> Result<Place, NatalError> {
    let mut query = args.place.clone();
    let mut pick = args.pick;
    loop {
        let text = match query.take() {
            Some(text) => text,
            None => Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(field_label("place"))
                .interact_text()?,
        };
        resolver.input(text.clone());
        resolver.search(&text).await;

        if resolver.suggestions().is_empty() {
            if resolver.shows_no_results() {
                eprintln!("Nenhuma cidade encontrada para \"{}\"", text.trim());
            } else {
                eprintln!("Digite ao menos 2 letras do nome da cidade");
            }
            pick = None;
            continue;
        }

        let labels: Vec<String> =
            resolver.suggestions().iter().map(Suggestion::label).collect();
        let index = match pick.take().filter(|n| (1..=labels.len()).contains(n)) {
            Some(n) => Some(n - 1),
            None => Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Escolha a cidade")
                .items(&labels)
                .default(0)
                .interact_opt()?,
        };
        let Some(index) = index else {
            resolver.handle_key(Key::Escape);
            continue;
        };
        for _ in 0..=index {
            resolver.handle_key(Key::Down);
        }
        if let Some(place) = resolver.handle_key(Key::Enter) {
            return Ok(place);
        }
    }
}

/// Writes reports to disk in place of a browser page.
struct FileSink {
    out_dir: PathBuf,
    error: Option<io::Error>,
}

impl FileSink {
    fn new(out_dir: PathBuf) -> Self {
        Self {
            out_dir,
            error: None,
        }
    }

    fn write(&mut self, name: &str, contents: &[u8]) -> Option<PathBuf> {
        let path = self.out_dir.join(name);
        match fs::create_dir_all(&self.out_dir).and_then(|_| fs::write(&path, contents)) {
            Ok(()) => Some(path),
            Err(e) => {
                log::error!("Could not write {}: {e}", path.display());
                self.error = Some(e);
                None
            }
        }
    }

    fn finish(self) -> Result<(), NatalError> {
        match self.error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl ReportSink for FileSink {
    fn replace_document(&mut self, html: String) {
        if let Some(path) = self.write("report.html", html.as_bytes()) {
            println!("Relatório salvo em {}", path.display());
        }
    }

    fn open_pdf(&mut self, pdf: Vec<u8>) {
        if let Some(path) = self.write("report.pdf", &pdf) {
            let path = fs::canonicalize(&path).unwrap_or(path);
            println!("file://{}", path.display());
        }
    }

    fn json_result(&mut self, value: Option<serde_json::Value>) {
        match value.and_then(|v| serde_json::to_string_pretty(&v).ok()) {
            Some(json) => println!("{json}"),
            None => println!("Pedido enviado."),
        }
    }

    fn alert(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

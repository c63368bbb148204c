use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::unbounded;
use tracing::{debug, info};

use autoedit::config::{default_config_path, load_config_or_default};
use autoedit::imaging;
use autoedit::{
    Config, ProcessingMode, ResultRecord, ResultStore, StageError, StepBoard, StepStatus,
    StoredResult, Workflow, WorkflowConfig,
};

/// Caption, refine and edit images from a short brief
#[derive(Parser)]
#[command(name = "autoedit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/autoedit/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow on one image
    Process {
        /// Input image
        #[arg(long)]
        image: PathBuf,

        /// What to do with the image
        #[arg(long)]
        prompt: String,

        /// "casual" or "professional" (default from config)
        #[arg(long)]
        mode: Option<String>,

        /// Also write the edited image here
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip writing to the result store
        #[arg(long)]
        no_save: bool,
    },

    /// Browse stored results
    Results {
        #[command(subcommand)]
        action: ResultsAction,
    },
}

#[derive(Subcommand)]
enum ResultsAction {
    /// Newest results first
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Details of one result
    Show { id: String },

    /// Results whose prompt contains a keyword
    Search { keyword: String },
}

type ProgressEvent = (usize, StepStatus, String);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_settings(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output_directory = dir.to_string_lossy().into_owned();
    }
    autoedit::logging::init(&config.logging);

    match cli.command {
        Commands::Process {
            image,
            prompt,
            mode,
            out,
            no_save,
        } => {
            let mode = mode
                .as_deref()
                .map(ProcessingMode::from)
                .unwrap_or(config.default_mode);
            if no_save {
                config.persist_results = false;
            }
            run_process(&config, &image, &prompt, mode, out.as_deref())
        }
        Commands::Results { action } => {
            let store = ResultStore::open(&config.output_directory).with_context(|| {
                format!("failed to open result store at {}", config.output_directory)
            })?;
            match action {
                ResultsAction::List { limit } => print_list(&store.recent(limit)),
                ResultsAction::Search { keyword } => print_list(&store.search(&keyword)),
                ResultsAction::Show { id } => show_result(&store, &id)?,
            }
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Config> {
    let (path, config) = match path {
        Some(path) => (path.to_path_buf(), read_config(path, true)),
        None => match default_config_path() {
            Some(path) => {
                let config = read_config(&path, false);
                (path, config)
            }
            None => return Ok(Config::default()),
        },
    };
    config.with_context(|| format!("failed to load config: {}", path.display()))
}

/// An explicitly requested file must exist; the default location may not.
fn read_config(path: &Path, required: bool) -> autoedit::Result<Config> {
    let config = if required {
        autoedit::load_config(path)?
    } else {
        load_config_or_default(path)?
    };
    Ok(config)
}

fn build_workflow(config: &Config) -> autoedit::Result<Workflow> {
    Ok(Workflow::from_config(&WorkflowConfig::from_config(config))?)
}

fn run_process(
    config: &Config,
    image_path: &Path,
    prompt: &str,
    mode: ProcessingMode,
    out: Option<&Path>,
) -> Result<()> {
    let image = std::fs::read(image_path)
        .with_context(|| format!("failed to read image: {}", image_path.display()))?;

    let workflow = build_workflow(config).context("failed to set up workflow")?;
    info!(
        caption = workflow.captioner_backend(),
        edit = workflow.editor_backend(),
        mode = %mode,
        "Starting workflow"
    );

    let started = Instant::now();
    let mut board = StepBoard::for_mode(mode);
    let outcome = drive(&workflow, prompt, &image, mode, &mut board);
    workflow.release_models();

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            board.fail_current("Processing failed. Please try again.");
            eprintln!("{}", board.render());
            bail!("workflow thread panicked");
        }
    };
    let record = match outcome {
        Ok(record) => record.with_duration(started.elapsed().as_secs_f64()),
        Err(e) => {
            board.fail_current("Processing failed. Please try again.");
            eprintln!("{}", board.render());
            bail!("Something went wrong while editing the image: {}", e);
        }
    };

    if let (Some(path), Some(edited)) = (out, record.final_image()) {
        std::fs::write(path, edited.bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), "Wrote edited image");
    }

    print_record(&record, out);
    Ok(())
}

/// Runs the workflow on a worker thread and renders its progress here.
/// A panic in the worker comes back as `Err` instead of unwinding.
fn drive(
    workflow: &Workflow,
    prompt: &str,
    image: &[u8],
    mode: ProcessingMode,
    board: &mut StepBoard,
) -> thread::Result<Result<ResultRecord, StageError>> {
    let (tx, rx) = unbounded::<ProgressEvent>();

    thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let reporter = move |index: usize, status: StepStatus, message: &str| {
                let _ = tx.send((index, status, message.to_string()));
            };
            workflow.process(prompt, image, mode, Some(&reporter))
        });

        // Ends once the worker drops its sender.
        for (index, status, message) in rx.iter() {
            board.apply(index, status, &message);
            eprintln!("{}", board.render());
        }
        worker.join()
    })
}

fn print_record(record: &ResultRecord, out: Option<&Path>) {
    let Some(edited) = record.final_image() else {
        println!("No image provided, nothing to edit.");
        return;
    };

    println!("Prompt:  {}", record.user_prompt());
    if !record.caption().is_empty() {
        println!("Caption: {}", record.caption());
    }
    println!("Refined: {}", record.refined_prompt());
    if let Some(details) = record.original_image().and_then(imaging::describe) {
        println!("Before:  {}", details);
    }
    if let Some(details) = imaging::describe(edited.bytes()) {
        println!("After:   {}", details);
    }
    for step in record.steps() {
        println!("  [{}] {}: {}", step.status, step.name, step.detail);
    }
    if let Some(seconds) = record.duration_seconds() {
        println!("Took {:.1}s", seconds);
    }
    if let Some(id) = record.stored_id() {
        println!("Saved as {}", id);
    }
    if let Some(path) = out {
        println!("Written to {}", path.display());
    }
}

fn print_list(results: &[StoredResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for result in results {
        println!(
            "{}  {}  {}",
            result.id,
            result.timestamp.format("%Y-%m-%d %H:%M:%S"),
            result.user_prompt
        );
    }
}

fn show_result(store: &ResultStore, id: &str) -> Result<()> {
    let Some(result) = store.get(id) else {
        bail!("no result with id {}", id);
    };

    println!("Id:        {}", result.id);
    println!("Timestamp: {}", result.timestamp.to_rfc3339());
    println!("Prompt:    {}", result.user_prompt);
    if !result.caption.is_empty() {
        println!("Caption:   {}", result.caption);
    }
    println!("Refined:   {}", result.refined_prompt);
    for step in &result.steps {
        println!("  [{}] {}: {}", step.status, step.name, step.detail);
    }

    if let Some(path) = result
        .image_filename
        .as_deref()
        .and_then(|f| store.image_path(f))
    {
        println!("Image:     {}", path.display());
        let bytes = store.load_image(&result)?;
        if let Some(details) = imaging::describe(&bytes) {
            println!("           {}", details);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_process() {
        let cli = Cli::try_parse_from([
            "autoedit",
            "--output-dir",
            "/tmp/out",
            "process",
            "--image",
            "in.png",
            "--prompt",
            "make it vintage",
            "--mode",
            "professional",
            "--no-save",
        ])
        .unwrap();

        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
        match cli.command {
            Commands::Process {
                prompt,
                mode,
                no_save,
                out,
                ..
            } => {
                assert_eq!(prompt, "make it vintage");
                assert_eq!(mode.as_deref(), Some("professional"));
                assert!(no_save);
                assert!(out.is_none());
            }
            _ => panic!("expected process"),
        }
    }

    #[test]
    fn test_cli_parses_results_list() {
        let cli = Cli::try_parse_from(["autoedit", "results", "list", "--limit", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Results {
                action: ResultsAction::List { limit: 3 }
            }
        ));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let missing = Path::new("/nonexistent/autoedit/config.json");

        let err = read_config(missing, true).unwrap_err();
        assert!(matches!(
            err,
            autoedit::AutoEditError::Config(autoedit::ConfigError::ReadFile { .. })
        ));

        let config = read_config(missing, false).unwrap();
        assert_eq!(config.version, Config::default().version);
    }

    #[test]
    fn test_build_workflow_reports_storage_errors() {
        let mut config = Config::default();
        config.output_directory = "/dev/null/autoedit".to_string();
        config.persist_results = true;

        let err = build_workflow(&config).err().unwrap();
        assert!(matches!(
            err,
            autoedit::AutoEditError::Storage(autoedit::StorageError::CreateDirectory { .. })
        ));
    }

    struct PanickingCaptioner;

    impl autoedit::Captioner for PanickingCaptioner {
        fn caption(
            &self,
            _image: &[u8],
            _prompt: &str,
            _progress: &dyn autoedit::pipeline::PhaseReporter,
        ) -> std::result::Result<String, StageError> {
            panic!("caption backend crashed");
        }

        fn backend(&self) -> &str {
            "panicking"
        }
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        imaging::encode_png(&image::DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[test]
    fn test_drive_renders_board_to_completion() {
        let workflow = Workflow::new(
            Box::new(autoedit::stages::PlaceholderCaptioner),
            Box::new(autoedit::stages::PassthroughEditor),
        );
        let mut board = StepBoard::for_mode(ProcessingMode::Casual);

        let record = drive(&workflow, "make it vintage", &tiny_png(), ProcessingMode::Casual, &mut board)
            .unwrap()
            .unwrap();

        assert_eq!(record.steps().len(), 4);
        assert!(board.is_finished());
    }

    #[test]
    fn test_drive_returns_worker_panic() {
        let workflow = Workflow::new(
            Box::new(PanickingCaptioner),
            Box::new(autoedit::stages::PassthroughEditor),
        );
        let mut board = StepBoard::for_mode(ProcessingMode::Casual);

        let outcome = drive(&workflow, "x", &tiny_png(), ProcessingMode::Casual, &mut board);

        assert!(outcome.is_err());
        assert_eq!(board.current(), 0);
        assert!(!board.is_finished());
    }

    #[test]
    fn test_cli_requires_prompt() {
        assert!(Cli::try_parse_from(["autoedit", "process", "--image", "a.png"]).is_err());
    }
}

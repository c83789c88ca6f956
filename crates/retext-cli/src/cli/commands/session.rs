//! Interactive session: a line REPL over one version history.
//!
//! Lines starting with `:` are commands; everything else is rejected with a
//! hint. Text enters the session through `:load` or `:set`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use retext_core::config::Config;
use retext_core::history::VersionHistory;
use retext_core::pipeline::{PipelineError, TransformPipeline};
use retext_core::providers::ModelGateway;
use retext_core::transforms::{
    CatalogStore, Toggled, TransformationSelection, UserContext, find_transformation,
};

use super::{build_pipeline, open_catalog};

const QUIT_COMMAND: &str = ":q";
const PROMPT_PREFIX: &str = "retext> ";

const HELP: &str = "\
Commands:
  :load PATH      Load text from a file (starts a new history)
  :set TEXT       Use TEXT as the original (starts a new history)
  :select NAME    Toggle a transformation by name or id
  :clear          Clear the selection
  :selected       Show the selection in order
  :apply          Apply the selection to the current version
  :back           Go to the previous version
  :forward        Go to the next version
  :original       Jump to the original text
  :show           Print the current version
  :previous       Print the version before the current one
  :status         Show version position and selection size
  :save [DIR]     Save the current version as transformed_<timestamp>.md
  :help           Show this help
  :q              Quit";

/// Mutable state of one session.
pub struct SessionState {
    history: VersionHistory,
    selection: TransformationSelection,
    user_context: UserContext,
    max_transformations: usize,
}

impl SessionState {
    pub fn new(max_transformations: usize, user_context: UserContext) -> Self {
        Self {
            history: VersionHistory::new(),
            selection: TransformationSelection::new(),
            user_context,
            max_transformations,
        }
    }

    fn load_file(&mut self, path: &Path) -> Result<usize> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let chars = text.chars().count();
        self.history.reset(text);
        Ok(chars)
    }

    fn status_line(&self) -> String {
        format!(
            "Version: {}/{}  Selected: {}/{}",
            self.history.position(),
            self.history.count(),
            self.selection.len(),
            self.max_transformations
        )
    }
}

pub async fn run(config: &Config, file: Option<&Path>, model_override: Option<&str>) -> Result<()> {
    let catalog = open_catalog(config)?;
    let pipeline = build_pipeline(config, model_override)?;

    let mut state = SessionState::new(config.max_transformations, config.user_context());
    if let Some(path) = file {
        state.load_file(path)?;
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    run_session(stdin.lock(), &mut stdout, &catalog, &pipeline, &mut state).await
}

/// Runs the REPL until `:q` or EOF.
pub async fn run_session<R, W, C, G>(
    input: R,
    output: &mut W,
    catalog: &C,
    pipeline: &TransformPipeline<G>,
    state: &mut SessionState,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    C: CatalogStore + ?Sized,
    G: ModelGateway,
{
    writeln!(output, "retext session. Type :help for commands.")?;
    if !state.history.is_empty() {
        writeln!(output, "{}", state.status_line())?;
    }
    write!(output, "{PROMPT_PREFIX}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed == QUIT_COMMAND {
            writeln!(output, "Goodbye!")?;
            return Ok(());
        }

        if !trimmed.is_empty()
            && let Err(e) = handle_line(trimmed, output, catalog, pipeline, state).await
        {
            writeln!(output, "Error: {e:#}")?;
        }

        write!(output, "{PROMPT_PREFIX}")?;
        output.flush()?;
    }

    writeln!(output)?;
    Ok(())
}

async fn handle_line<W, C, G>(
    line: &str,
    output: &mut W,
    catalog: &C,
    pipeline: &TransformPipeline<G>,
    state: &mut SessionState,
) -> Result<()>
where
    W: Write,
    C: CatalogStore + ?Sized,
    G: ModelGateway,
{
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));

    match command {
        ":help" => writeln!(output, "{HELP}")?,
        ":load" => {
            if arg.is_empty() {
                anyhow::bail!("Usage: :load PATH");
            }
            let chars = state.load_file(Path::new(arg))?;
            writeln!(output, "Loaded {chars} characters from {arg}")?;
        }
        ":set" => {
            if arg.is_empty() {
                anyhow::bail!("Usage: :set TEXT");
            }
            state.history.reset(arg);
            writeln!(output, "{}", state.status_line())?;
        }
        ":select" => {
            if arg.is_empty() {
                anyhow::bail!("Usage: :select NAME");
            }
            let spec = find_transformation(catalog, arg)?
                .with_context(|| format!("Unknown transformation: {arg}"))?;
            let name = spec.name.clone();
            match state.selection.toggle(spec, state.max_transformations)? {
                Toggled::Selected => writeln!(
                    output,
                    "Selected {name} ({}/{})",
                    state.selection.len(),
                    state.max_transformations
                )?,
                Toggled::Deselected => writeln!(output, "Deselected {name}")?,
            }
        }
        ":clear" => {
            state.selection.clear();
            writeln!(output, "Selection cleared")?;
        }
        ":selected" => {
            if state.selection.is_empty() {
                writeln!(output, "Nothing selected")?;
            }
            for (i, spec) in state.selection.iter().enumerate() {
                writeln!(output, "{}. {} [{}]", i + 1, spec.name, spec.category)?;
            }
        }
        ":apply" => {
            let source = state.history.current().to_string();
            let user_context = (!state.user_context.is_empty()).then_some(&state.user_context);
            let result = match pipeline
                .run(&state.selection, &source, user_context, &mut state.history)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "session apply failed");
                    let transient = matches!(&e, PipelineError::Gateway(g) if g.is_transient());
                    writeln!(output, "Error: {:#}", anyhow::Error::new(e))?;
                    if transient {
                        writeln!(output, "This may be temporary. Run :apply again to retry.")?;
                    }
                    return Ok(());
                }
            };
            writeln!(output, "{result}")?;
            writeln!(output, "{}", state.status_line())?;
        }
        ":back" => match state.history.go_back() {
            Some(text) => writeln!(output, "{text}")?,
            None => writeln!(output, "Already at the first version")?,
        },
        ":forward" => match state.history.go_forward() {
            Some(text) => writeln!(output, "{text}")?,
            None => writeln!(output, "Already at the latest version")?,
        },
        ":original" => {
            if state.history.is_empty() {
                writeln!(output, "No text loaded")?;
            } else {
                writeln!(output, "{}", state.history.restore_original())?;
            }
        }
        ":show" => {
            if state.history.is_empty() {
                writeln!(output, "No text loaded")?;
            } else {
                writeln!(output, "{}", state.history.current())?;
            }
        }
        ":previous" => match state.history.previous() {
            Some(text) => writeln!(output, "{text}")?,
            None => writeln!(output, "No previous version")?,
        },
        ":status" => writeln!(output, "{}", state.status_line())?,
        ":save" => {
            if state.history.is_empty() {
                anyhow::bail!("Nothing to save");
            }
            let dir = if arg.is_empty() {
                PathBuf::from(".")
            } else {
                PathBuf::from(arg)
            };
            let path = save_current(&dir, state.history.current())?;
            writeln!(output, "Saved to {}", path.display())?;
        }
        _ => writeln!(
            output,
            "Unknown input '{command}'. Use :set TEXT to enter text or :help for commands."
        )?,
    }

    Ok(())
}

fn save_current(dir: &Path, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let file_name = format!(
        "transformed_{}.md",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(file_name);
    std::fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

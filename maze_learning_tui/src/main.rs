mod sweep;

use anyhow::{Context, Result};
use clap::Parser;
use maze_learning_core::{
    Position,
    agent::EpsilonGreedy,
    environment::{CellKind, Maze, load_maze_from_string},
    learner::{GreedyRun, QLearner, TrainingConfig},
    map::Grid,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    symbols::Marker,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, BufWriter, Stdout},
    path::{Path, PathBuf},
    time::Duration,
};
use sweep::{RunConfig, SweepResult, SweepSelection, run_sweeps};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reward axis range of the learning-curve chart.
const REWARD_AXIS: [f64; 2] = [-20.0, 20.0];

const RUN_COLORS: [Color; 3] = [Color::Cyan, Color::Yellow, Color::Magenta];

#[derive(Parser, Debug)]
#[command(version, about = "Train a Q-learning agent on a grid maze", long_about = None)]
struct Args {
    /// Maze layout file (one row per line, cell codes 0-4)
    #[arg(short, long, value_name = "MAZE_FILE", default_value = "mazes/maze01.txt")]
    maze: PathBuf,

    /// JSON file with `training` and `rewards` sections
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Hyperparameter sweeps to run
    #[arg(short, long, value_enum, default_value_t = SweepSelection::All)]
    sweep: SweepSelection,

    #[arg(long)]
    episodes: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    exploration_rate: Option<f64>,

    #[arg(long)]
    exploration_decay: Option<f64>,

    #[arg(long)]
    discount_rate: Option<f64>,

    /// Start every run from an empty table instead of the previous run's table
    #[arg(long)]
    fresh_table: bool,

    /// Seed for action selection
    #[arg(long)]
    seed: Option<u64>,

    /// Write all histories to this JSON file
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    output: Option<PathBuf>,

    /// Print a text summary instead of opening the chart view
    #[arg(long)]
    no_tui: bool,
}

impl Args {
    /// Base configuration: defaults, then the config file, then flags.
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => RunConfig::default(),
        };

        let training: &mut TrainingConfig = &mut config.training;
        if let Some(episodes) = self.episodes {
            training.episodes = episodes;
        }
        if let Some(rate) = self.learning_rate {
            training.learning_rate = rate;
        }
        if let Some(rate) = self.exploration_rate {
            training.exploration_rate = rate;
        }
        if let Some(decay) = self.exploration_decay {
            training.exploration_decay = decay;
        }
        if let Some(rate) = self.discount_rate {
            training.discount_rate = rate;
        }
        Ok(config)
    }
}

struct App {
    /// Results of every sweep, one tab each.
    sweeps: Vec<SweepResult>,
    /// Index of the sweep being shown.
    selected: usize,
    /// Layout with the agent placed where the greedy policy stopped.
    maze_view: Grid<CellKind>,
    greedy: GreedyRun,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn next_sweep(&mut self) {
        if !self.sweeps.is_empty() {
            self.selected = (self.selected + 1) % self.sweeps.len();
        }
    }

    fn previous_sweep(&mut self) {
        if !self.sweeps.is_empty() {
            self.selected = (self.selected + self.sweeps.len() - 1) % self.sweeps.len();
        }
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = args.run_config()?;
    let maze = load_maze(&args.maze, &config)?;
    info!(
        "Loaded {}x{} maze from {} ({} free cells, loss threshold {})",
        maze.layout().rows(),
        maze.layout().cols(),
        args.maze.display(),
        maze.free_cells().len(),
        maze.loss_threshold()
    );

    let selector = match args.seed {
        Some(seed) => EpsilonGreedy::new(seed),
        None => EpsilonGreedy::from_entropy(),
    };
    let mut learner = QLearner::with_selector(maze, selector);
    let sweeps = run_sweeps(&mut learner, args.sweep, &config.training, args.fresh_table);

    if let Some(path) = &args.output {
        write_histories(path, &sweeps)?;
        info!("Wrote histories to {}", path.display());
    }

    let max_steps = 4 * learner.maze().layout().len();
    let greedy = learner.greedy_path(max_steps);
    let maze_view = learner.maze().render_with_agent()?;

    let mut app = App {
        sweeps,
        selected: 0,
        maze_view,
        greedy,
        should_quit: false,
    };

    if args.no_tui {
        print_summary(&app);
        return Ok(());
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main application loop
    let result = run_app(&mut terminal, &mut app);

    // Restore the terminal state
    restore_terminal(&mut terminal)?;

    result
}

fn load_maze(path: &Path, config: &RunConfig) -> Result<Maze> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read maze file {}", path.display()))?;
    load_maze_from_string(&text, config.rewards)
        .with_context(|| format!("Failed to load maze from {}", path.display()))
}

fn write_histories(path: &Path, sweeps: &[SweepResult]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), sweeps)
        .with_context(|| format!("Failed to write histories to {}", path.display()))?;
    Ok(())
}

/// One-line summary of a training run.
fn run_summary(run: &sweep::SweepRun) -> String {
    let history = &run.history;
    format!(
        "{}: won {}/{} ({:.1}%), last reward {:.2}, final ε {:.4}, table {} entries",
        run.label,
        history.win_count(),
        history.episodes(),
        100.0 * history.win_rate(),
        history.rewards.last().copied().unwrap_or(0.0),
        history.final_exploration_rate,
        run.table_size
    )
}

fn format_path(path: &[Position]) -> String {
    path.iter()
        .map(|p| format!("({}, {})", p.row, p.col))
        .collect::<Vec<_>>()
        .join("->")
}

fn cell_symbol(cell: CellKind, on_path: bool) -> &'static str {
    match cell {
        CellKind::Wall => "#",
        CellKind::Start => "S",
        CellKind::Exit => "E",
        CellKind::Current => "@",
        CellKind::Available if on_path => ".",
        CellKind::Available => " ",
    }
}

/// Prints results for `--no-tui`.
fn print_summary(app: &App) {
    for sweep in &app.sweeps {
        println!("{}", sweep.title);
        for run in &sweep.runs {
            println!("  {}", run_summary(run));
            if let Some(path) = run.history.last_path() {
                println!("    last episode: {}", format_path(path));
            }
        }
    }

    println!(
        "Greedy path ({:?}, reward {:.2}): {}",
        app.greedy.status,
        app.greedy.total_reward,
        format_path(&app.greedy.path)
    );
    for (row, cells) in app.maze_view.row_slices().enumerate() {
        let line: String = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| cell_symbol(*cell, app.greedy.path.contains(&Position::new(row, col))))
            .collect();
        println!("|{line}|");
    }
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?; // Use alternate screen and enable mouse capture
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into) // Map io::Error to anyhow::Error
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let poll_rate = Duration::from_millis(250);

    loop {
        // Draw the UI
        terminal.draw(|f| ui(f, app))?;

        // Poll for events (keyboard, mouse, etc.)
        if crossterm::event::poll(poll_rate)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Tab | KeyCode::Right => app.next_sweep(),
                    KeyCode::BackTab | KeyCode::Left => app.previous_sweep(),
                    _ => {}
                }
            }
        }

        // Exit loop if requested
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),      // Sweep tabs
            Constraint::Percentage(60), // Learning curves
            Constraint::Min(6),         // Maze and run summaries
            Constraint::Length(2),      // Help
        ])
        .split(frame.area());

    let titles: Vec<String> = app.sweeps.iter().map(|s| s.title.clone()).collect();
    let tabs = Tabs::new(titles)
        .select(app.selected)
        .block(Block::default().borders(Borders::ALL).title("Sweeps"))
        .highlight_style(Style::default().fg(Color::Yellow).bold());
    frame.render_widget(tabs, main_layout[0]);

    if let Some(sweep) = app.sweeps.get(app.selected) {
        render_chart(frame, main_layout[1], sweep);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(main_layout[2]);
        render_maze(frame, bottom[0], app);
        render_runs(frame, bottom[1], sweep);
    }

    let help_text = Paragraph::new("Tab/←/→ switch sweep, 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[3]);
}

/// Renders reward per episode for every run of a sweep.
fn render_chart(frame: &mut Frame, area: Rect, sweep: &SweepResult) {
    let points: Vec<Vec<(f64, f64)>> = sweep
        .runs
        .iter()
        .map(|run| {
            run.history
                .rewards
                .iter()
                .enumerate()
                .map(|(episode, reward)| (episode as f64, reward.clamp(REWARD_AXIS[0], REWARD_AXIS[1])))
                .collect()
        })
        .collect();

    let datasets: Vec<Dataset> = sweep
        .runs
        .iter()
        .zip(&points)
        .enumerate()
        .map(|(i, (run, data))| {
            Dataset::default()
                .name(run.label.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(RUN_COLORS[i % RUN_COLORS.len()]))
                .data(data)
        })
        .collect();

    let episodes = sweep
        .runs
        .iter()
        .map(|run| run.history.episodes())
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Q-learning: {}", sweep.title)),
        )
        .x_axis(
            Axis::default()
                .title("Episode number")
                .bounds([0.0, episodes])
                .labels(vec!["0".to_string(), format!("{}", episodes as usize)]),
        )
        .y_axis(
            Axis::default()
                .title("Reward")
                .bounds(REWARD_AXIS)
                .labels(vec!["-20", "0", "20"]),
        );
    frame.render_widget(chart, area);
}

/// Renders the maze with the greedy path marked.
fn render_maze(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::with_capacity(app.maze_view.rows());
    for (row, cells) in app.maze_view.row_slices().enumerate() {
        let spans: Vec<Span> = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                let on_path = app.greedy.path.contains(&Position::new(row, col));
                let style = match cell {
                    CellKind::Wall => Style::default().fg(Color::DarkGray),
                    CellKind::Current => Style::default().fg(Color::Red).bold(),
                    CellKind::Exit => Style::default().fg(Color::Green),
                    _ if on_path => Style::default().fg(Color::Yellow),
                    _ => Style::default(),
                };
                Span::styled(cell_symbol(*cell, on_path), style)
            })
            .collect();
        lines.push(Line::from(spans));
    }

    let title = format!(
        "Greedy path: {:?} in {} steps",
        app.greedy.status,
        app.greedy.path.len().saturating_sub(1)
    );
    let maze_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(maze_paragraph, area);
}

/// Renders the summary line of each run.
fn render_runs(frame: &mut Frame, area: Rect, sweep: &SweepResult) {
    let items: Vec<ListItem> = sweep
        .runs
        .iter()
        .enumerate()
        .map(|(i, run)| {
            ListItem::from(Line::from(Span::styled(
                run_summary(run),
                Style::default().fg(RUN_COLORS[i % RUN_COLORS.len()]),
            )))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Runs"));
    frame.render_widget(list, area);
}

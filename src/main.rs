use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    time::Duration,
};
use time_humanize::{Accuracy, HumanTime, Tense};

use codetap::{
    catalog::Catalog,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    report::AttemptLog,
    runtime::{AutoAdvance, CrosstermEventSource, Runner, TrainerEvent},
    session::Session,
    store::{self, FileKvStore, KvStore, MemoryKvStore},
    streak::StreakCounter,
    symbol::Correctness,
    task::Task,
    ui::{FrameView, Screen},
};

const TICK_RATE_MS: u64 = 100;
const EXPORT_FILE: &str = "codetap_session.json";

/// terminal typing trainer for code snippets
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing trainer that walks you through real code snippets character by character, keeps strict accuracy across corrections, and resumes every task exactly where you left it."
)]
pub struct Cli {
    /// task id to open (see --list); defaults to the last active task
    #[clap(short = 't', long)]
    task: Option<String>,

    /// list available tasks and exit
    #[clap(long)]
    list: bool,

    /// ignore saved progress and keep this run in memory only
    #[clap(long)]
    fresh: bool,

    /// advance to the next task automatically after a finish
    #[clap(long)]
    auto_next: bool,

    /// write the saved progress for the task to PATH and exit
    #[clap(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// delete saved progress for the task and exit
    #[clap(long)]
    reset_progress: bool,
}

pub struct App {
    pub catalog: Catalog,
    pub store: Box<dyn KvStore>,
    pub config: Config,
    pub session: Session,
    pub streak: StreakCounter,
    pub screen: Screen,
    pub auto_advance: AutoAdvance,
    pub saved_hint: Option<String>,
    pub log: AttemptLog,
    pub clock: SystemClock,
    pub quit: bool,
}

impl App {
    pub fn new(
        catalog: Catalog,
        store: Box<dyn KvStore>,
        config: Config,
        initial_task: Task,
    ) -> Self {
        let mut app = Self {
            catalog,
            store,
            config,
            session: Session::new(initial_task.clone()),
            streak: StreakCounter::default(),
            screen: Screen::Typing,
            auto_advance: AutoAdvance::default(),
            saved_hint: None,
            log: AttemptLog::new(),
            clock: SystemClock,
            quit: false,
        };
        app.open_task(&initial_task.id);
        app
    }

    fn open_task(&mut self, id: &str) {
        let Some(task) = self.catalog.find(id).cloned() else {
            return;
        };
        self.streak.reset();
        self.auto_advance.cancel();

        match store::load_session(self.store.as_ref(), &task) {
            Some((session, saved_at)) => {
                self.saved_hint = Some(saved_hint(saved_at));
                self.session = session;
            }
            None => {
                self.saved_hint = None;
                self.session = Session::new(task);
            }
        }
        store::save_active_task_id(self.store.as_mut(), &self.session.task.id);
        self.screen = if self.session.finished {
            Screen::Results
        } else {
            Screen::Typing
        };
    }

    fn next_task(&mut self) {
        let next_id = self
            .catalog
            .next_after(&self.session.task.id)
            .map(|t| t.id.clone());
        if let Some(id) = next_id {
            self.open_task(&id);
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.quit = true,
                KeyCode::Char('r') => self.restart_attempt(),
                KeyCode::Char('x') => self.hard_reset(),
                KeyCode::Char('n') => self.next_task(),
                _ => {}
            }
            return;
        }

        match self.screen {
            Screen::Typing => match key.code {
                KeyCode::Esc => self.quit = true,
                KeyCode::Backspace => {
                    self.session.backspace(&self.clock);
                    self.after_mutation();
                }
                KeyCode::Enter => self.type_char('\n'),
                KeyCode::Tab => self.type_char('\t'),
                KeyCode::Char(c) => self.type_char(c),
                _ => {}
            },
            Screen::Results => match key.code {
                KeyCode::Esc => self.quit = true,
                KeyCode::Char('r') => self.restart_attempt(),
                KeyCode::Char('n') => self.next_task(),
                KeyCode::Char('e') => {
                    let _ = store::export_session(&self.session, &self.clock, Path::new(EXPORT_FILE));
                }
                _ => {}
            },
        }
    }

    fn type_char(&mut self, ch: char) {
        if self.session.finished {
            return;
        }
        self.session.input(ch, &self.clock);
        if let Some(symbol) = self
            .session
            .cursor
            .checked_sub(1)
            .and_then(|i| self.session.symbols.get(i))
        {
            self.streak
                .record(symbol.correctness == Correctness::Correct);
        }
        self.after_mutation();
    }

    /// The one place where every user action converges: persist, then
    /// check for a finish.
    fn after_mutation(&mut self) {
        store::save_session(self.store.as_mut(), &self.session, &self.clock);
        self.saved_hint = None;
        if self.session.finished && self.screen == Screen::Typing {
            self.on_finished();
        }
    }

    fn on_finished(&mut self) {
        self.screen = Screen::Results;
        let stats = self.session.stats(&self.clock);
        let _ = self.log.append(&self.session.task.id, &stats, self.streak.best);
        if self.config.auto_next {
            self.auto_advance
                .arm(self.clock.now_ms(), self.config.auto_next_delay_ms);
        }
    }

    /// Start the attempt over, keeping the error history (taint flags).
    fn restart_attempt(&mut self) {
        self.auto_advance.cancel();
        self.session.restart_attempt();
        self.streak.reset();
        self.screen = Screen::Typing;
        self.after_mutation();
    }

    /// Full reset: forget the error history and the saved progress.
    fn hard_reset(&mut self) {
        self.auto_advance.cancel();
        self.session.reset();
        store::clear_session(self.store.as_mut(), &self.session.task.id);
        self.streak.reset();
        self.saved_hint = None;
        self.screen = Screen::Typing;
    }

    pub fn on_tick(&mut self) {
        // The deadline only advances the task if the session is still
        // finished when it fires; a retry in the meantime cancels it.
        if self.auto_advance.fire(self.clock.now_ms())
            && self.config.auto_next
            && self.session.finished
        {
            self.next_task();
        }
    }

    fn frame_view(&self) -> FrameView<'_> {
        FrameView {
            session: &self.session,
            stats: self.session.stats(&self.clock),
            streak: self.streak,
            screen: self.screen,
            saved_hint: self.saved_hint.as_deref(),
            auto_next_armed: self.auto_advance.is_armed(),
        }
    }
}

fn saved_hint(saved_at: chrono::DateTime<chrono::Local>) -> String {
    let secs = (chrono::Local::now() - saved_at).num_seconds().max(0) as u64;
    let ago = HumanTime::from(Duration::from_secs(secs)).to_text_en(Accuracy::Rough, Tense::Past);
    format!("resumed · saved {ago}")
}

fn resolve_task<'a>(
    catalog: &'a Catalog,
    store: &dyn KvStore,
    requested: Option<&str>,
) -> Result<&'a Task, Box<dyn Error>> {
    if let Some(id) = requested {
        return catalog
            .find(id)
            .ok_or_else(|| format!("unknown task id: {id}").into());
    }
    let last = store::load_active_task_id(store);
    catalog
        .pick_initial(last.as_deref())
        .ok_or_else(|| "task catalog is empty".into())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let catalog = Catalog::load()?;

    if cli.list {
        for task in catalog.tasks() {
            println!("{}\t{}", task.id, task.title);
        }
        return Ok(());
    }

    let mut store: Box<dyn KvStore> = if cli.fresh {
        Box::new(MemoryKvStore::default())
    } else {
        Box::new(FileKvStore::new())
    };
    let clock = SystemClock;

    if let Some(path) = cli.export.as_ref() {
        let task = resolve_task(&catalog, store.as_ref(), cli.task.as_deref())?;
        let session = store::load_session(store.as_ref(), task)
            .map(|(s, _)| s)
            .unwrap_or_else(|| Session::new(task.clone()));
        store::export_session(&session, &clock, path)?;
        println!("exported {} to {}", task.id, path.display());
        return Ok(());
    }

    if cli.reset_progress {
        let task_id = resolve_task(&catalog, store.as_ref(), cli.task.as_deref())?
            .id
            .clone();
        store::clear_session(store.as_mut(), &task_id);
        println!("cleared progress for {task_id}");
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if cli.auto_next {
        config.auto_next = true;
        let _ = config_store.save(&config);
    }

    let initial_task = resolve_task(&catalog, store.as_ref(), cli.task.as_deref())?.clone();
    let mut app = App::new(catalog, store, config, initial_task);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );

    terminal.draw(|f| draw(app, f))?;

    loop {
        match runner.step() {
            TrainerEvent::Tick => {
                app.on_tick();
                // redraw only when the timer is visibly running or a
                // countdown to the next task is on screen
                if (app.session.active && !app.session.finished) || app.auto_advance.is_armed() {
                    terminal.draw(|f| draw(app, f))?;
                }
            }
            TrainerEvent::Resize => {
                terminal.draw(|f| draw(app, f))?;
            }
            TrainerEvent::Key(key) => {
                app.on_key(key);
                if app.quit {
                    break;
                }
                terminal.draw(|f| draw(app, f))?;
            }
        }
        if app.quit {
            break;
        }
    }

    Ok(())
}

fn draw(app: &App, f: &mut Frame) {
    let view = app.frame_view();
    f.render_widget(&view, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_default_values() {
        let cli = Cli::parse_from(["codetap"]);
        assert_eq!(cli.task, None);
        assert!(!cli.list);
        assert!(!cli.fresh);
        assert!(!cli.auto_next);
        assert_eq!(cli.export, None);
        assert!(!cli.reset_progress);
    }

    #[test]
    fn cli_parses_task_and_flags() {
        let cli = Cli::parse_from(["codetap", "-t", "13:1:1", "--fresh", "--auto-next"]);
        assert_eq!(cli.task.as_deref(), Some("13:1:1"));
        assert!(cli.fresh);
        assert!(cli.auto_next);
    }

    #[test]
    fn cli_parses_export_path() {
        let cli = Cli::parse_from(["codetap", "--export", "/tmp/dump.json"]);
        assert_eq!(cli.export, Some(PathBuf::from("/tmp/dump.json")));
    }

    fn test_app() -> App {
        let catalog = Catalog::load().unwrap();
        let first = catalog.tasks()[0].clone();
        App::new(
            catalog,
            Box::new(MemoryKvStore::default()),
            Config::default(),
            first,
        )
    }

    fn press(app: &mut App, code: KeyCode) {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn typing_advances_and_persists() {
        let mut app = test_app();
        let first_char = app.session.task.code.chars().next().unwrap();
        press(&mut app, KeyCode::Char(first_char));
        assert_eq!(app.session.cursor, 1);
        assert_eq!(app.streak.current, 1);

        // the mutation landed in the store
        let reloaded = store::load_session(app.store.as_ref(), &app.session.task);
        assert_eq!(reloaded.unwrap().0.cursor, 1);
    }

    #[test]
    fn wrong_key_resets_the_streak() {
        let mut app = test_app();
        let first_char = app.session.task.code.chars().next().unwrap();
        press(&mut app, KeyCode::Char(first_char));
        // '\u{0}' can never match a snippet char
        press(&mut app, KeyCode::Char('\u{0}'));
        assert_eq!(app.streak.current, 0);
        assert_eq!(app.streak.best, 1);
    }

    #[test]
    fn finishing_a_task_lands_on_results() {
        let mut app = test_app();
        app.log = AttemptLog::with_path(std::env::temp_dir().join("codetap_test_results.csv"));
        let code = app.session.task.code.clone();
        for ch in code.chars() {
            match ch {
                '\n' => press(&mut app, KeyCode::Enter),
                '\t' => press(&mut app, KeyCode::Tab),
                c => press(&mut app, KeyCode::Char(c)),
            }
        }
        assert!(app.session.finished);
        assert_eq!(app.screen, Screen::Results);
    }

    #[test]
    fn ctrl_n_switches_to_the_next_task() {
        let mut app = test_app();
        let before = app.session.task.id.clone();
        app.on_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert_ne!(app.session.task.id, before);
        // the active task id followed the switch
        assert_eq!(
            store::load_active_task_id(app.store.as_ref()).as_deref(),
            Some(app.session.task.id.as_str())
        );
    }

    #[test]
    fn restart_keeps_taint_but_hard_reset_clears_it() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char('\u{0}'));
        press(&mut app, KeyCode::Backspace);
        assert!(app.session.symbols[0].fixed);

        app.on_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL));
        assert!(app.session.symbols[0].fixed);
        assert_eq!(app.session.cursor, 0);

        app.on_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert!(!app.session.symbols[0].fixed);
        assert!(store::load_session(app.store.as_ref(), &app.session.task).is_none());
    }

    #[test]
    fn esc_requests_quit() {
        let mut app = test_app();
        press(&mut app, KeyCode::Esc);
        assert!(app.quit);
    }
}

mod input;
mod view;

use std::{future::Future, io, path::PathBuf, thread, time::Duration};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use crystalball_core::{
    billing::{self, Plan, BILLING_TEST_MODE_MESSAGE},
    prediction::UploadResult,
    session::DEMO_CREDENTIALS,
    AppConfig, AuthError, FilePreviewer, HttpClient, IntakeError, PredictionSource,
    PredictionState, PredictionStore, Session, SessionStore, TransportError, UploadError,
};
use ratatui::{backend::CrosstermBackend, style::Color, Terminal};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, info, warn};

use self::input::{InputOutcome, TextInput};

const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    accent_alt: Color,
    highlight: Color,
    rain: Color,
    muted: Color,
    success: Color,
    warning: Color,
    danger: Color,
    on_accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Rgb(0, 217, 255),
            accent_alt: Color::Rgb(143, 95, 248),
            highlight: Color::Rgb(217, 70, 239),
            rain: Color::Rgb(0, 85, 255),
            muted: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Rgb(255, 77, 109),
            on_accent: Color::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Landing,
    Dashboard,
    Pricing,
    Settings,
    Upload,
    Login,
    NotFound,
}

impl Screen {
    /// Screens listed in the header, in tab order.
    const NAV: [Screen; 4] = [
        Screen::Dashboard,
        Screen::Upload,
        Screen::Pricing,
        Screen::Settings,
    ];

    fn title(self) -> &'static str {
        match self {
            Screen::Landing => "Home",
            Screen::Dashboard => "Dashboard",
            Screen::Pricing => "Pricing",
            Screen::Settings => "Settings",
            Screen::Upload => "Upload",
            Screen::Login => "Login",
            Screen::NotFound => "Not Found",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Screen::Landing => "/",
            Screen::Dashboard => "/dashboard",
            Screen::Pricing => "/pricing",
            Screen::Settings => "/settings",
            Screen::Upload => "/upload",
            Screen::Login => "/login",
            Screen::NotFound => "/404",
        }
    }

    /// Resolve a typed location; anything unknown lands on the not-found screen.
    fn from_route(route: &str) -> Screen {
        let route = route.trim().trim_end_matches('/').to_ascii_lowercase();
        match route.trim_start_matches('/') {
            "" | "home" => Screen::Landing,
            "dashboard" => Screen::Dashboard,
            "pricing" => Screen::Pricing,
            "settings" => Screen::Settings,
            "upload" => Screen::Upload,
            "login" => Screen::Login,
            _ => Screen::NotFound,
        }
    }

    fn requires_session(self) -> bool {
        matches!(self, Screen::Dashboard | Screen::Settings | Screen::Upload)
    }

    fn nav_index(self) -> Option<usize> {
        Self::NAV.iter().position(|screen| *screen == self)
    }
}

enum AppEvent {
    Input(Event),
    Tick,
    LoggedIn(Result<Session, AuthError>),
    Refreshed(PredictionState),
    Previewed {
        path: String,
        previewer: FilePreviewer,
        result: Result<(), IntakeError>,
    },
    Uploaded {
        name: String,
        result: Result<UploadResult, UploadError>,
    },
    CheckoutReady {
        plan: Plan,
        result: Result<String, TransportError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginField {
    Identifier,
    Secret,
}

struct LoginForm {
    identifier: TextInput,
    secret: TextInput,
    focus: LoginField,
    error: Option<String>,
    pending: bool,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self {
            identifier: TextInput::default(),
            secret: TextInput::masked(),
            focus: LoginField::Identifier,
            error: None,
            pending: false,
        }
    }
}

impl LoginForm {
    fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            LoginField::Identifier => &mut self.identifier,
            LoginField::Secret => &mut self.secret,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Identifier => LoginField::Secret,
            LoginField::Secret => LoginField::Identifier,
        };
    }

    fn fill_demo(&mut self) {
        let (identifier, secret) = DEMO_CREDENTIALS;
        self.identifier.set(identifier);
        self.secret.set(secret);
        self.focus = LoginField::Secret;
        self.error = None;
    }
}

#[derive(Default)]
struct UploadForm {
    path: TextInput,
    error: Option<String>,
    loading: bool,
    submitting: bool,
    previewed_path: Option<String>,
}

/// Terminal front-end over the forecasting client.
pub struct CrystalBallApp {
    config: AppConfig,
    client: HttpClient,
    session: SessionStore,
    predictions: PredictionStore,
    previewer: FilePreviewer,
    screen: Screen,
    after_login: Screen,
    state: UiState,
    theme: Theme,
    login: LoginForm,
    upload: UploadForm,
    goto: Option<TextInput>,
    plan_cursor: usize,
    checkout_pending: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
}

impl CrystalBallApp {
    pub fn new(
        config: AppConfig,
        client: HttpClient,
        session: SessionStore,
        predictions: PredictionStore,
        previewer: FilePreviewer,
    ) -> Self {
        Self {
            config,
            client,
            session,
            predictions,
            previewer,
            screen: Screen::Landing,
            after_login: Screen::Dashboard,
            state: UiState::default(),
            theme: Theme::default(),
            login: LoginForm::default(),
            upload: UploadForm::default(),
            goto: None,
            plan_cursor: 0,
            checkout_pending: false,
            event_tx: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let greeting = match self.session.current().identity {
            Some(identity) => format!("Welcome back, {}", identity.display_name),
            None => "Press Enter to get started".to_string(),
        };
        self.state.set_status(greeting);

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) || self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        if let Some(sender) = self.event_tx.clone() {
            spawn(async move {
                let event = task.await;
                if sender.send(event).await.is_err() {
                    debug!("event loop closed before task finished");
                }
            });
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    self.state.set_status(format!("Error: {err}"));
                }
            }
            Some(AppEvent::Tick) => self.handle_tick(),
            Some(AppEvent::LoggedIn(result)) => self.handle_login_result(result),
            Some(AppEvent::Refreshed(state)) => self.handle_refreshed(state),
            Some(AppEvent::Previewed {
                path,
                previewer,
                result,
            }) => self.handle_previewed(path, previewer, result),
            Some(AppEvent::Uploaded { name, result }) => self.handle_uploaded(name, result),
            Some(AppEvent::CheckoutReady { plan, result }) => {
                self.handle_checkout_result(plan, result)
            }
            None => return false,
        }
        true
    }

    fn handle_tick(&mut self) {
        self.state.tick = self.state.tick.wrapping_add(1);
        if self.screen.requires_session() && !self.session.is_authenticated() {
            info!(screen = self.screen.path(), "session ended; returning to login");
            self.require_login(self.screen, "Session expired; sign in again");
        }
    }

    fn navigate(&mut self, screen: Screen) {
        if screen.requires_session() && !self.session.is_authenticated() {
            self.require_login(screen, "Sign in to continue");
            return;
        }
        debug!(from = self.screen.path(), to = screen.path(), "navigate");
        self.screen = screen;
        if screen == Screen::Dashboard && self.predictions.state() == PredictionState::Empty {
            self.start_refresh();
        }
    }

    fn require_login(&mut self, target: Screen, message: &str) {
        self.after_login = target;
        self.screen = Screen::Login;
        self.login.focus = LoginField::Identifier;
        self.state.set_status(message.to_string());
    }

    fn go_to_route(&mut self, route: &str) {
        let screen = Screen::from_route(route);
        if screen == Screen::NotFound {
            self.state.last_route = Some(route.trim().to_string());
        }
        self.navigate(screen);
    }

    fn logout(&mut self) {
        self.session.logout();
        self.login = LoginForm::default();
        self.screen = Screen::Landing;
        self.state.set_status("Signed out".to_string());
    }

    fn start_refresh(&mut self) {
        let store = self.predictions.clone();
        let client = self.client.clone();
        self.state.set_status("Consulting the crystal ball...".to_string());
        self.spawn_task(async move { AppEvent::Refreshed(store.refresh(&client).await) });
    }

    fn handle_refreshed(&mut self, state: PredictionState) {
        let PredictionState::Loaded(forecast) = state else {
            return;
        };
        let message = match forecast.source {
            PredictionSource::Remote => format!("Forecast updated ({} days)", forecast.series.len()),
            PredictionSource::Fallback => {
                "Backend unavailable; showing the demo forecast".to_string()
            }
            PredictionSource::Upload => "Forecast from your upload".to_string(),
        };
        self.state.set_status(message);
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return Ok(());
        }
        if self.goto.is_some() {
            self.handle_goto_key(key);
            return Ok(());
        }
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('g') {
            self.open_goto();
            return Ok(());
        }

        let screen = self.screen;
        match screen {
            Screen::Login => self.handle_login_key(key),
            Screen::Upload => self.handle_upload_key(key),
            _ if self.handle_global_shortcut(&key) => {}
            Screen::Landing => self.handle_landing_key(key),
            Screen::Dashboard => self.handle_dashboard_key(key),
            Screen::Pricing => self.handle_pricing_key(key),
            Screen::Settings => self.handle_settings_key(key),
            Screen::NotFound => self.handle_not_found_key(key),
        }
        Ok(())
    }

    fn handle_global_shortcut(&mut self, key: &KeyEvent) -> bool {
        if !(key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT) {
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.state.should_quit = true,
            KeyCode::Char(':') => self.open_goto(),
            KeyCode::Char('0') => self.navigate(Screen::Landing),
            KeyCode::Char('1') => self.navigate(Screen::Dashboard),
            KeyCode::Char('2') => self.navigate(Screen::Upload),
            KeyCode::Char('3') => self.navigate(Screen::Pricing),
            KeyCode::Char('4') => self.navigate(Screen::Settings),
            KeyCode::Tab => self.cycle_nav(1),
            KeyCode::BackTab => self.cycle_nav(-1),
            KeyCode::Char('L') if self.session.is_authenticated() => self.logout(),
            _ => return false,
        }
        true
    }

    fn cycle_nav(&mut self, delta: isize) {
        let len = Screen::NAV.len() as isize;
        let next = match self.screen.nav_index() {
            Some(index) => (index as isize + delta).rem_euclid(len),
            None => 0,
        };
        self.navigate(Screen::NAV[next as usize]);
    }

    fn open_goto(&mut self) {
        let mut prompt = TextInput::default();
        prompt.set(self.screen.path());
        self.goto = Some(prompt);
    }

    fn handle_goto_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.goto.as_mut() else {
            return;
        };
        match prompt.handle_key(key) {
            InputOutcome::Submit => {
                let route = prompt.value().to_string();
                self.goto = None;
                self.go_to_route(&route);
            }
            InputOutcome::Cancel => self.goto = None,
            InputOutcome::Edited | InputOutcome::Ignored => {}
        }
    }

    fn handle_landing_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Enter {
            self.navigate(Screen::Dashboard);
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('r') => self.start_refresh(),
            KeyCode::Char('u') => self.navigate(Screen::Upload),
            _ => {}
        }
    }

    fn handle_pricing_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Enter {
            self.navigate(Screen::Settings);
        }
    }

    fn handle_not_found_key(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            self.navigate(Screen::Dashboard);
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Up | KeyCode::Char('k') => {
                self.plan_cursor = self.plan_cursor.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Char('j') => {
                self.plan_cursor = (self.plan_cursor + 1).min(Plan::ALL.len() - 1);
            }
            KeyCode::Enter => self.start_checkout(),
            _ => {}
        }
    }

    fn selected_plan(&self) -> Plan {
        Plan::ALL[self.plan_cursor.min(Plan::ALL.len() - 1)]
    }

    fn start_checkout(&mut self) {
        if self.checkout_pending {
            return;
        }
        let plan = self.selected_plan();
        let client = self.client.clone();
        self.checkout_pending = true;
        self.state
            .set_status(format!("Opening checkout for {plan}..."));
        self.spawn_task(async move {
            let result = billing::checkout(&client, plan).await;
            AppEvent::CheckoutReady { plan, result }
        });
    }

    fn handle_checkout_result(&mut self, plan: Plan, result: Result<String, TransportError>) {
        self.checkout_pending = false;
        match result {
            Ok(url) => {
                info!(?plan, %url, "checkout ready");
                self.state.set_status(format!("Continue checkout at {url}"));
            }
            Err(err) => {
                warn!(?plan, %err, "checkout failed");
                self.state.set_status(BILLING_TEST_MODE_MESSAGE.to_string());
            }
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('d') {
            self.login.fill_demo();
            return;
        }
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.toggle_focus();
                return;
            }
            _ => {}
        }
        match self.login.focused_mut().handle_key(key) {
            InputOutcome::Submit => self.submit_login(),
            InputOutcome::Cancel => {
                self.login.error = None;
                self.screen = Screen::Landing;
            }
            InputOutcome::Edited | InputOutcome::Ignored => {}
        }
    }

    fn submit_login(&mut self) {
        if self.login.pending {
            return;
        }
        self.login.pending = true;
        self.login.error = None;
        let session = self.session.clone();
        let identifier = self.login.identifier.value().to_string();
        let secret = self.login.secret.value().to_string();
        self.state.set_status("Authenticating...".to_string());
        self.spawn_task(async move {
            AppEvent::LoggedIn(session.login(&identifier, &secret).await)
        });
    }

    fn handle_login_result(&mut self, result: Result<Session, AuthError>) {
        self.login.pending = false;
        match result {
            Ok(session) => {
                let name = session
                    .identity
                    .map(|identity| identity.display_name)
                    .unwrap_or_default();
                self.login.secret.clear();
                self.state.set_status(format!("Signed in as {name}"));
                let target = self.after_login;
                self.after_login = Screen::Dashboard;
                self.navigate(target);
            }
            Err(err) => {
                self.state.set_status("Sign in failed".to_string());
                self.login.error = Some(err.to_string());
            }
        }
    }

    fn handle_upload_key(&mut self, key: KeyEvent) {
        match self.upload.path.handle_key(key) {
            InputOutcome::Submit => self.submit_upload_path(),
            InputOutcome::Cancel => {
                if self.previewer.accepted().is_some() || self.upload.error.is_some() {
                    self.previewer.clear();
                    self.upload.previewed_path = None;
                    self.upload.error = None;
                    self.state.set_status("File removed".to_string());
                } else {
                    self.navigate(Screen::Dashboard);
                }
            }
            InputOutcome::Edited | InputOutcome::Ignored => {}
        }
    }

    fn submit_upload_path(&mut self) {
        if self.upload.loading || self.upload.submitting {
            return;
        }
        let raw = self.upload.path.value().trim().to_string();
        if raw.is_empty() {
            self.upload.error = Some("Enter the path of a CSV file".to_string());
            return;
        }
        let ready = self.previewer.table().is_some()
            && self.upload.previewed_path.as_deref() == Some(raw.as_str());
        if ready {
            self.start_upload();
        } else {
            self.start_preview(raw);
        }
    }

    fn start_preview(&mut self, raw: String) {
        let path = expand_home(&raw);
        let mut previewer = self.previewer.clone();
        self.upload.loading = true;
        self.upload.error = None;
        self.spawn_task(async move {
            let result = previewer.load(&path).await.map(|_| ());
            AppEvent::Previewed {
                path: raw,
                previewer,
                result,
            }
        });
    }

    fn handle_previewed(
        &mut self,
        path: String,
        previewer: FilePreviewer,
        result: Result<(), IntakeError>,
    ) {
        self.upload.loading = false;
        self.previewer = previewer;
        match result {
            Ok(()) => {
                let name = self
                    .previewer
                    .accepted()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                self.upload.previewed_path = Some(path);
                self.state
                    .set_status(format!("Loaded {name}; press Enter to analyse"));
            }
            Err(IntakeError::Validation(err)) => {
                self.upload.previewed_path = None;
                self.upload.error = Some(err.to_string());
            }
            Err(IntakeError::Read(err)) => {
                warn!(%path, %err, "preview failed");
                self.upload.previewed_path = None;
                self.upload.error = Some(format!("Could not read file: {err}"));
            }
        }
    }

    fn start_upload(&mut self) {
        let Some(file) = self.previewer.accepted().cloned() else {
            return;
        };
        let client = self.client.clone();
        self.upload.submitting = true;
        self.state
            .set_status(format!("Analysing {}...", file.name()));
        self.spawn_task(async move {
            let result = client.upload_csv(&file).await;
            AppEvent::Uploaded {
                name: file.name().to_string(),
                result,
            }
        });
    }

    fn handle_uploaded(&mut self, name: String, result: Result<UploadResult, UploadError>) {
        self.upload.submitting = false;
        match result {
            Ok(payload) => {
                if self.predictions.apply_upload_result(payload) {
                    info!(%name, "upload analysed");
                    self.state.set_status(format!("Forecast updated from {name}"));
                    self.navigate(Screen::Dashboard);
                } else {
                    self.state
                        .set_status("The backend returned no forecast; keeping current data".to_string());
                }
            }
            Err(err) => {
                warn!(%name, %err, "upload failed");
                self.upload.error = Some(format!("Upload failed: {err}"));
            }
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

/// Up to two uppercase initials from a display name.
fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    status: String,
    should_quit: bool,
    tick: u64,
    last_route: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            should_quit: false,
            tick: 0,
            last_route: None,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystalball_core::{
        config::ApiConfig,
        error::ValidationError,
        models::{ForecastPoint, ForecastStats},
        TokenStore, UploadFile,
    };
    use tempfile::TempDir;

    fn app() -> (CrystalBallApp, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = AppConfig {
            state_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let tokens = TokenStore::new(config.session_path());
        let api = ApiConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            ..ApiConfig::default()
        };
        let client = HttpClient::new(&api, tokens).expect("client");
        let session = SessionStore::new(client.clone(), true);
        let app = CrystalBallApp::new(
            config,
            client,
            session,
            PredictionStore::new(),
            FilePreviewer::default(),
        );
        (app, dir)
    }

    fn press(app: &mut CrystalBallApp, code: KeyCode) {
        app.handle_input(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
            .expect("key handled");
    }

    fn ctrl(app: &mut CrystalBallApp, ch: char) {
        app.handle_input(Event::Key(KeyEvent::new(
            KeyCode::Char(ch),
            KeyModifiers::CONTROL,
        )))
        .expect("key handled");
    }

    fn type_str(app: &mut CrystalBallApp, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn routes_resolve_to_screens() {
        assert_eq!(Screen::from_route("/"), Screen::Landing);
        assert_eq!(Screen::from_route("/dashboard"), Screen::Dashboard);
        assert_eq!(Screen::from_route("Pricing/"), Screen::Pricing);
        assert_eq!(Screen::from_route(" /settings "), Screen::Settings);
        assert_eq!(Screen::from_route("/upload"), Screen::Upload);
        assert_eq!(Screen::from_route("/login"), Screen::Login);
        assert_eq!(Screen::from_route("/nowhere"), Screen::NotFound);
        assert_eq!(Screen::from_route("/dashboard/extra"), Screen::NotFound);
    }

    #[test]
    fn initials_come_from_display_name() {
        assert_eq!(initials("Chef Mario"), "CM");
        assert_eq!(initials("anna"), "A");
        assert_eq!(initials("Jean Luc Picard"), "JL");
        assert_eq!(initials("  "), "?");
    }

    #[test]
    fn protected_screens_require_login() {
        let (mut app, _dir) = app();
        app.navigate(Screen::Settings);
        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.after_login, Screen::Settings);

        app.navigate(Screen::Pricing);
        assert_eq!(app.screen, Screen::Pricing);
    }

    #[tokio::test]
    async fn login_result_opens_requested_screen() {
        let (mut app, _dir) = app();
        app.navigate(Screen::Upload);
        let session = app
            .session
            .login("chef@x.com", "pw")
            .await
            .expect("demo fallback login");
        app.handle_login_result(Ok(session));
        assert_eq!(app.screen, Screen::Upload);
        assert_eq!(app.state.status, "Signed in as Chef");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, Screen::Dashboard);
        type_str(&mut app, "L");
        assert_eq!(app.screen, Screen::Landing);
        assert!(!app.session.is_authenticated());
    }

    #[test]
    fn rejected_login_shows_error() {
        let (mut app, _dir) = app();
        app.screen = Screen::Login;
        app.login.pending = true;
        app.handle_login_result(Err(AuthError::CredentialsRequired));
        assert!(!app.login.pending);
        assert_eq!(app.login.error.as_deref(), Some("credentials required"));
        assert_eq!(app.screen, Screen::Login);
    }

    #[test]
    fn demo_shortcut_fills_the_form() {
        let (mut app, _dir) = app();
        app.screen = Screen::Login;
        ctrl(&mut app, 'd');
        assert_eq!(app.login.identifier.value(), "demo@user.com");
        assert_eq!(app.login.secret.value(), "demo");

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.login.focus, LoginField::Identifier);
    }

    #[test]
    fn goto_prompt_navigates_and_tracks_unknown_paths() {
        let (mut app, _dir) = app();
        type_str(&mut app, ":");
        assert!(app.goto.is_some());
        for _ in 0..app.screen.path().len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_str(&mut app, "/mystery");
        press(&mut app, KeyCode::Enter);
        assert!(app.goto.is_none());
        assert_eq!(app.screen, Screen::NotFound);
        assert_eq!(app.state.last_route.as_deref(), Some("/mystery"));

        ctrl(&mut app, 'g');
        press(&mut app, KeyCode::Esc);
        assert!(app.goto.is_none());
        assert_eq!(app.screen, Screen::NotFound);
    }

    #[test]
    fn rejected_file_is_reported_inline() {
        let (mut app, _dir) = app();
        app.screen = Screen::Upload;
        app.upload.loading = true;
        let mut previewer = FilePreviewer::default();
        let err = previewer
            .accept(UploadFile::from_bytes("menu.pdf", "application/pdf", "x"))
            .expect_err("pdf is rejected");
        app.handle_previewed(
            "menu.pdf".to_string(),
            previewer,
            Err(IntakeError::Validation(err)),
        );
        assert!(!app.upload.loading);
        assert_eq!(
            app.upload.error.as_deref(),
            Some(
                ValidationError::NotCsv {
                    media_type: "application/pdf".to_string()
                }
                .to_string()
                .as_str()
            )
        );
        assert!(app.previewer.table().is_none());
    }

    #[test]
    fn upload_escape_clears_before_leaving() {
        let (mut app, _dir) = app();
        app.client.tokens().set_token("demo-token").expect("token");
        app.screen = Screen::Upload;

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.upload.error.as_deref(), Some("Enter the path of a CSV file"));

        press(&mut app, KeyCode::Esc);
        assert!(app.upload.error.is_none());
        assert_eq!(app.screen, Screen::Upload);
        assert_eq!(app.state.status, "File removed");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, Screen::Dashboard);
    }

    #[test]
    fn upload_result_updates_dashboard() {
        let (mut app, _dir) = app();
        app.client.tokens().set_token("demo-token").expect("token");
        app.upload.submitting = true;
        let date = chrono_date(2024, 2, 1);
        let payload = UploadResult {
            status: Some("success".to_string()),
            predictions: Some(vec![ForecastPoint::new(date, 61.0, 82.0, None, None)]),
            model_stats: Some(ForecastStats::default()),
        };
        app.handle_uploaded("history.csv".to_string(), Ok(payload));
        assert!(!app.upload.submitting);
        assert_eq!(app.screen, Screen::Dashboard);
        assert_eq!(app.predictions.source(), Some(PredictionSource::Upload));
        assert_eq!(app.state.status, "Forecast updated from history.csv");
    }

    #[test]
    fn failed_checkout_reports_test_mode() {
        let (mut app, _dir) = app();
        app.checkout_pending = true;
        app.handle_checkout_result(Plan::Yearly, Err(TransportError::Timeout));
        assert!(!app.checkout_pending);
        assert_eq!(app.state.status, BILLING_TEST_MODE_MESSAGE);
    }

    fn chrono_date(year: i32, month: u32, day: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }
}

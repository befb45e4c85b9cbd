use std::path::PathBuf;

use chrono::{Local, NaiveDate, NaiveTime};
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use healthdesk_core::appointments::{
    self, AppointmentSummary, ConsultationType, Department, Gender, NewAppointment,
};
use healthdesk_core::config::{DataPaths, MAX_RECORD_SECONDS, MIN_RECORD_SECONDS};
use healthdesk_core::consult::resolve_question;
use healthdesk_core::dashboard::{self, Activity, DashboardStats, Share};
use healthdesk_core::imaging::{self, ImageUpload};
use healthdesk_core::pharmacy::{self, Cart, Medicine, MAX_QTY};
use healthdesk_core::prescriptions::{self, Prescription};
use healthdesk_core::reports::{self, NewReport, Report, ReportType};
use healthdesk_core::state::VISIBLE_HISTORY;
use healthdesk_core::tts::{self, GoogleTts};
use healthdesk_core::voice::{AudioUpload, Recorder};
use healthdesk_core::{
    auth, ChatHistory, Config, ConsultationMode, DeskError, DeskResult, Exchange, GeminiClient,
    HealthDb, Language, Session,
};

use crate::form::{Field, Form};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Signup,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Consult,
    Imaging,
    Reports,
    Appointments,
    Pharmacy,
    Dashboard,
}

impl Tab {
    pub fn all() -> [Tab; 6] {
        [
            Tab::Consult,
            Tab::Imaging,
            Tab::Reports,
            Tab::Appointments,
            Tab::Pharmacy,
            Tab::Dashboard,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Consult => "Voice Consultation",
            Tab::Imaging => "Image Analysis",
            Tab::Reports => "Medical Reports",
            Tab::Appointments => "Appointments",
            Tab::Pharmacy => "Prescriptions & Pharmacy",
            Tab::Dashboard => "Health Dashboard",
        }
    }

    pub fn index(&self) -> usize {
        Tab::all().iter().position(|t| t == self).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Which pane of a multi-pane tab receives navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneFocus {
    Form,
    Records,
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Status {
    pub level: StatusLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    Microphone,
    Upload,
}

/// Result of a background task, applied to the app when the task finishes
#[derive(Debug)]
pub enum TaskOutput {
    Answer { question: String, answer: String, language: Language },
    Transcript { source: TranscriptSource, text: String },
    ImageAnalysis { file_name: String, text: String },
    Suggestion { symptoms: String, text: String },
    Tip(String),
}

pub struct PendingTask {
    pub label: &'static str,
    pub handle: JoinHandle<DeskResult<TaskOutput>>,
}

// Form field labels shared by the builders, the submit handlers and the renderer
pub const F_USERNAME: &str = "Username";
pub const F_PASSWORD: &str = "Password";
pub const F_CONFIRM: &str = "Confirm password";
pub const F_MODE: &str = "Consultation mode";
pub const F_LANGUAGE: &str = "Response language";
pub const F_AUDIO: &str = "Audio file (wav/mp3)";
pub const F_QUESTION: &str = "Type your question";
pub const F_VIDEO_DOCTOR: &str = "Doctor for video call";
pub const F_IMAGE: &str = "Image file (jpg/png)";
pub const F_REPORT_FILE: &str = "Report file (pdf/jpg/png)";
pub const F_REPORT_NAME: &str = "Report name";
pub const F_REPORT_TYPE: &str = "Report type";
pub const F_REPORT_DATE: &str = "Report date (YYYY-MM-DD)";
pub const F_NOTES: &str = "Notes (optional)";
pub const F_PATIENT: &str = "Patient name";
pub const F_AGE: &str = "Age";
pub const F_GENDER: &str = "Gender";
pub const F_PHONE: &str = "Phone number";
pub const F_EMAIL: &str = "Email";
pub const F_DEPARTMENT: &str = "Department";
pub const F_DOCTOR: &str = "Doctor";
pub const F_DATE: &str = "Preferred date (YYYY-MM-DD)";
pub const F_TIME: &str = "Preferred time (HH:MM)";
pub const F_CONSULT_TYPE: &str = "Consultation type";
pub const F_SYMPTOMS: &str = "Symptoms / reason";
pub const F_EMERGENCY: &str = "Mark as emergency";
pub const F_FOLLOWUP: &str = "Follow-up appointment";
pub const F_RX_SYMPTOMS: &str = "Describe symptoms";

fn login_form() -> Form {
    Form::new(vec![Field::text(F_USERNAME), Field::secret(F_PASSWORD)])
}

fn signup_form() -> Form {
    Form::new(vec![
        Field::text(F_USERNAME),
        Field::secret(F_PASSWORD),
        Field::secret(F_CONFIRM),
    ])
}

fn default_language(config: &Config) -> Language {
    config
        .language
        .as_deref()
        .and_then(Language::from_code)
        .unwrap_or(Language::English)
}

fn consult_form(language: Language) -> Form {
    let mut language_field = Field::choice(F_LANGUAGE, Language::all().iter().map(|l| l.display_name()));
    language_field.choice = Language::all().iter().position(|l| *l == language).unwrap_or(0);
    Form::new(vec![
        Field::choice(F_MODE, ConsultationMode::all().iter().map(|m| m.display_name())),
        language_field,
        Field::text(F_AUDIO),
        Field::text(F_QUESTION),
        Field::text(F_VIDEO_DOCTOR),
    ])
}

fn report_form() -> Form {
    Form::new(vec![
        Field::text(F_REPORT_FILE),
        Field::text(F_REPORT_NAME),
        Field::choice(F_REPORT_TYPE, ReportType::all().iter().map(|t| t.as_str())),
        Field::text(F_REPORT_DATE).with_value(Local::now().format("%Y-%m-%d").to_string()),
        Field::text(F_NOTES),
    ])
}

fn appointment_form(patient: &str) -> Form {
    Form::new(vec![
        Field::text(F_PATIENT).with_value(patient),
        Field::number(F_AGE, 1, 120, 25),
        Field::choice(F_GENDER, Gender::all().iter().map(|g| g.as_str())),
        Field::text(F_PHONE),
        Field::text(F_EMAIL),
        Field::choice(F_DEPARTMENT, Department::all().iter().map(|d| d.as_str())),
        Field::choice(F_DOCTOR, appointments::doctors()),
        Field::text(F_DATE).with_value(Local::now().format("%Y-%m-%d").to_string()),
        Field::text(F_TIME).with_value("10:00"),
        Field::choice(F_CONSULT_TYPE, ConsultationType::all().iter().map(|t| t.as_str())),
        Field::text(F_SYMPTOMS),
        Field::toggle(F_EMERGENCY),
        Field::toggle(F_FOLLOWUP),
    ])
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub tab: Tab,
    pub input_mode: InputMode,
    pub focus: PaneFocus,
    pub session: Option<Session>,
    pub status: Option<Status>,

    // Auth
    pub auth_form: Form,

    // Consultation
    pub consult_form: Form,
    pub history: ChatHistory,
    pub recorded_transcript: Option<String>,
    pub uploaded_transcript: Option<String>,
    pub speak_answers: bool,
    pub speech_task: Option<JoinHandle<DeskResult<()>>>,
    pub record_seconds: u32,
    pub mic_available: bool,

    // Image analysis
    pub image_form: Form,
    pub image_result: Option<(String, String)>,

    // Reports
    pub report_form: Form,
    pub reports: Vec<Report>,
    pub reports_state: ListState,

    // Appointments
    pub appointment_form: Form,
    pub appointments: Vec<AppointmentSummary>,

    // Prescriptions & pharmacy
    pub symptom_form: Form,
    pub prescriptions: Vec<Prescription>,
    pub prescriptions_state: ListState,
    pub catalog: Vec<Medicine>,
    pub catalog_state: ListState,
    pub pending_qty: Vec<u32>,
    pub cart: Cart,

    // Dashboard
    pub stats: DashboardStats,
    pub recent_activity: Vec<Activity>,
    pub per_month: Vec<(String, u32)>,
    pub distribution: Vec<Share>,
    pub tip: Option<String>,

    // Background work
    pub pending: Option<PendingTask>,
    pub animation_frame: u8,

    // Model picker / API key popups
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,
    pub show_api_key_input: bool,
    pub api_key_input: String,

    // Services
    pub db: HealthDb,
    pub paths: DataPaths,
    pub config: Config,
    pub gemini: GeminiClient,
    pub tts: GoogleTts,
    pub selected_model: String,
}

impl App {
    pub fn new(db: HealthDb, paths: DataPaths, config: Config) -> Self {
        let gemini = GeminiClient::new(&config.api_key().unwrap_or_default());
        let language = default_language(&config);
        let catalog = pharmacy::catalog();
        let mut catalog_state = ListState::default();
        catalog_state.select(Some(0));

        Self {
            should_quit: false,
            screen: Screen::Login,
            tab: Tab::Consult,
            input_mode: InputMode::Editing,
            focus: PaneFocus::Form,
            session: None,
            status: None,

            auth_form: login_form(),

            consult_form: consult_form(language),
            history: ChatHistory::new(),
            recorded_transcript: None,
            uploaded_transcript: None,
            speak_answers: true,
            speech_task: None,
            record_seconds: config.record_seconds(),
            mic_available: Recorder::is_available(),

            image_form: Form::new(vec![Field::text(F_IMAGE)]),
            image_result: None,

            report_form: report_form(),
            reports: Vec::new(),
            reports_state: ListState::default(),

            appointment_form: appointment_form(""),
            appointments: Vec::new(),

            symptom_form: Form::new(vec![Field::text(F_RX_SYMPTOMS)]),
            prescriptions: Vec::new(),
            prescriptions_state: ListState::default(),
            pending_qty: vec![0; catalog.len()],
            catalog,
            catalog_state,
            cart: Cart::new(),

            stats: DashboardStats::default(),
            recent_activity: Vec::new(),
            per_month: Vec::new(),
            distribution: Vec::new(),
            tip: None,

            pending: None,
            animation_frame: 0,

            show_model_picker: false,
            available_models: GeminiClient::list_models(),
            model_picker_state: ListState::default(),
            show_api_key_input: false,
            api_key_input: String::new(),

            selected_model: config.model(),
            db,
            paths,
            config,
            gemini,
            tts: GoogleTts::new(),
        }
    }

    pub fn username(&self) -> &str {
        self.session.as_ref().map(|s| s.username.as_str()).unwrap_or("")
    }

    // Status line
    pub fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status = Some(Status { level, text: text.into() });
    }

    pub fn report_error(&mut self, err: &DeskError) {
        let level = match err {
            DeskError::Validation(_) | DeskError::NotFound(_) => StatusLevel::Warning,
            _ => StatusLevel::Error,
        };
        self.set_status(level, err.to_string());
    }

    /// The form that receives keystrokes in editing mode, if any.
    pub fn active_form_mut(&mut self) -> Option<&mut Form> {
        match self.screen {
            Screen::Login | Screen::Signup => Some(&mut self.auth_form),
            Screen::Main => match self.tab {
                Tab::Consult => Some(&mut self.consult_form),
                Tab::Imaging => Some(&mut self.image_form),
                Tab::Reports => Some(&mut self.report_form),
                Tab::Appointments => Some(&mut self.appointment_form),
                Tab::Pharmacy => Some(&mut self.symptom_form),
                Tab::Dashboard => None,
            },
        }
    }

    // Auth
    pub fn toggle_auth_screen(&mut self) {
        self.screen = match self.screen {
            Screen::Login => Screen::Signup,
            _ => Screen::Login,
        };
        self.auth_form = match self.screen {
            Screen::Signup => signup_form(),
            _ => login_form(),
        };
        self.status = None;
    }

    pub fn submit_auth(&mut self) {
        let username = self.auth_form.value(F_USERNAME).to_string();
        let password = self.auth_form.value(F_PASSWORD).to_string();

        match self.screen {
            Screen::Signup => {
                let confirm = self.auth_form.value(F_CONFIRM).to_string();
                match auth::signup(&self.db, &username, &password, &confirm) {
                    Ok(()) => {
                        self.toggle_auth_screen();
                        self.auth_form.set_value(F_USERNAME, username.trim());
                        self.auth_form.focused = 1;
                        self.set_status(StatusLevel::Success, "Account created! You can now login.");
                    }
                    Err(e) => self.report_error(&e),
                }
            }
            _ => match auth::login(&self.db, &username, &password) {
                Ok(session) => {
                    let name = session.username.clone();
                    self.session = Some(session);
                    self.screen = Screen::Main;
                    self.tab = Tab::Consult;
                    self.input_mode = InputMode::Normal;
                    self.focus = PaneFocus::Form;
                    self.appointment_form = appointment_form(&name);
                    self.refresh_user_data();
                    self.set_status(StatusLevel::Success, format!("Welcome, {}!", name));
                }
                Err(e) => self.report_error(&e),
            },
        }
    }

    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            info!("User {} logged out", session.username);
        }
        if let Some(task) = self.pending.take() {
            task.handle.abort();
        }
        if let Some(task) = self.speech_task.take() {
            task.abort();
        }
        self.history.clear();
        self.consult_form = consult_form(default_language(&self.config));
        self.image_form = Form::new(vec![Field::text(F_IMAGE)]);
        self.report_form = report_form();
        self.appointment_form = appointment_form("");
        self.symptom_form = Form::new(vec![Field::text(F_RX_SYMPTOMS)]);
        self.pending_qty.iter_mut().for_each(|q| *q = 0);
        self.cart = Cart::new();
        self.recorded_transcript = None;
        self.uploaded_transcript = None;
        self.image_result = None;
        self.tip = None;
        self.reports.clear();
        self.appointments.clear();
        self.prescriptions.clear();
        self.screen = Screen::Login;
        self.auth_form = login_form();
        self.input_mode = InputMode::Editing;
        self.set_status(StatusLevel::Info, "Logged out");
    }

    /// Reload every per-user list from the database.
    pub fn refresh_user_data(&mut self) {
        if let Err(e) = self.try_refresh() {
            warn!("Refresh failed: {}", e);
            self.report_error(&e);
        }
    }

    fn try_refresh(&mut self) -> DeskResult<()> {
        let user = self.username().to_string();
        self.reports = reports::list_reports(&self.db, &user)?;
        self.appointments = appointments::list_recent(&self.db, &user, appointments::RECENT_LIMIT)?;
        self.prescriptions = prescriptions::list(&self.db, &user)?;
        self.stats = DashboardStats::load(&self.db, &user)?;
        self.recent_activity = dashboard::recent_activity(&self.db, &user, 5)?;
        self.per_month = dashboard::appointments_per_month(&self.db, &user)?;
        self.distribution = dashboard::report_distribution(&self.db, &user)?;

        clamp_selection(&mut self.reports_state, self.reports.len());
        clamp_selection(&mut self.prescriptions_state, self.prescriptions.len());
        Ok(())
    }

    pub fn next_tab(&mut self, forward: bool) {
        let tabs = Tab::all();
        let i = self.tab.index();
        let next = if forward { (i + 1) % tabs.len() } else { (i + tabs.len() - 1) % tabs.len() };
        self.select_tab(tabs[next]);
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.focus = PaneFocus::Form;
        self.input_mode = InputMode::Normal;
    }

    /// Tab key in normal mode: cycle through the panes of the current tab.
    pub fn cycle_focus(&mut self) {
        self.focus = match (self.tab, self.focus) {
            (Tab::Reports, PaneFocus::Form) => PaneFocus::Records,
            (Tab::Pharmacy, PaneFocus::Form) => PaneFocus::Records,
            (Tab::Pharmacy, PaneFocus::Records) => PaneFocus::Catalog,
            _ => PaneFocus::Form,
        };
    }

    // Consultation
    pub fn selected_mode(&self) -> ConsultationMode {
        ConsultationMode::all()
            .get(self.consult_form.choice(F_MODE))
            .copied()
            .unwrap_or(ConsultationMode::GeneralHealth)
    }

    pub fn selected_language(&self) -> Language {
        Language::all()
            .get(self.consult_form.choice(F_LANGUAGE))
            .copied()
            .unwrap_or(Language::English)
    }

    pub fn visible_history(&self) -> &[Exchange] {
        self.history.recent(VISIBLE_HISTORY)
    }

    fn spawn(&mut self, label: &'static str, handle: JoinHandle<DeskResult<TaskOutput>>) {
        self.pending = Some(PendingTask { label, handle });
        self.animation_frame = 0;
    }

    fn busy(&mut self) -> bool {
        if self.pending.is_some() {
            self.set_status(StatusLevel::Warning, "Please wait for the current request to finish.");
            return true;
        }
        false
    }

    pub fn start_recording(&mut self) {
        if self.busy() {
            return;
        }
        if !self.mic_available {
            self.set_status(
                StatusLevel::Warning,
                "Recording via microphone not available in this environment. Please use an audio file.",
            );
            return;
        }
        let seconds = self.record_seconds;
        let client = self.gemini.clone();
        let model = self.selected_model.clone();
        let language = self.selected_language();
        self.recorded_transcript = None;
        self.spawn(
            "Recording",
            tokio::spawn(async move {
                let recording = Recorder::record(seconds).await?;
                let wav = recording.to_wav()?;
                let text = client.transcribe(&model, &wav, "audio/wav", language).await?;
                Ok(TaskOutput::Transcript { source: TranscriptSource::Microphone, text })
            }),
        );
        self.set_status(StatusLevel::Info, format!("Recording for {} seconds...", seconds));
    }

    pub fn adjust_record_seconds(&mut self, forward: bool) {
        self.record_seconds = if forward {
            (self.record_seconds + 1).min(MAX_RECORD_SECONDS)
        } else {
            self.record_seconds.saturating_sub(1).max(MIN_RECORD_SECONDS)
        };
    }

    pub fn transcribe_upload(&mut self) {
        if self.busy() {
            return;
        }
        let path = PathBuf::from(self.consult_form.value(F_AUDIO).trim());
        let upload = match AudioUpload::from_path(&path) {
            Ok(upload) => upload,
            Err(e) => return self.report_error(&e),
        };
        let client = self.gemini.clone();
        let model = self.selected_model.clone();
        let language = self.selected_language();
        self.uploaded_transcript = None;
        self.spawn(
            "Transcribing",
            tokio::spawn(async move {
                let text = client
                    .transcribe(&model, &upload.bytes, upload.mime_type, language)
                    .await?;
                Ok(TaskOutput::Transcript { source: TranscriptSource::Upload, text })
            }),
        );
    }

    pub fn ask(&mut self) {
        if self.busy() {
            return;
        }
        let question = match resolve_question(
            self.recorded_transcript.as_deref(),
            self.uploaded_transcript.as_deref(),
            self.consult_form.value(F_QUESTION),
        ) {
            Ok(q) => q,
            Err(e) => return self.report_error(&e),
        };
        let client = self.gemini.clone();
        let model = self.selected_model.clone();
        let mode = self.selected_mode();
        let language = self.selected_language();
        self.spawn(
            "Asking AI",
            tokio::spawn(async move {
                let answer = client.medical_answer(&model, mode, language, &question).await;
                Ok(TaskOutput::Answer { question, answer, language })
            }),
        );
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.set_status(StatusLevel::Info, "Chat history cleared");
    }

    fn speak(&mut self, text: String, language: Language) {
        if !self.speak_answers {
            return;
        }
        if let Some(task) = self.speech_task.take() {
            task.abort();
        }
        let tts = self.tts.clone();
        let out = self.paths.root.join("speech").join("last_answer.mp3");
        self.speech_task = Some(tokio::spawn(async move {
            let audio = tts.synthesize(&text, language).await?;
            tts::save_mp3(&audio, &out)?;
            tts::play_mp3(audio).await
        }));
    }

    // Image analysis
    pub fn analyze_image(&mut self) {
        if self.busy() {
            return;
        }
        let path = PathBuf::from(self.image_form.value(F_IMAGE).trim());
        let upload = match ImageUpload::from_path(&path) {
            Ok(upload) => upload,
            Err(e) => return self.report_error(&e),
        };
        let client = self.gemini.clone();
        let model = self.selected_model.clone();
        self.spawn(
            "Analyzing image",
            tokio::spawn(async move {
                let text = imaging::analyze_image(&client, &model, &upload).await?;
                Ok(TaskOutput::ImageAnalysis { file_name: upload.file_name, text })
            }),
        );
    }

    // Reports
    pub fn save_report(&mut self) {
        let result = self.try_save_report();
        match result {
            Ok(()) => {
                self.report_form = report_form();
                self.refresh_user_data();
                self.set_status(StatusLevel::Success, "Report saved.");
            }
            Err(e) => self.report_error(&e),
        }
    }

    fn try_save_report(&self) -> DeskResult<()> {
        let form = &self.report_form;
        let date = parse_date(form.value(F_REPORT_DATE))?;
        let report_type = ReportType::all()
            .get(form.choice(F_REPORT_TYPE))
            .copied()
            .unwrap_or(ReportType::Other);
        let source = PathBuf::from(form.value(F_REPORT_FILE).trim());
        let new_report = NewReport {
            source: &source,
            name: form.value(F_REPORT_NAME),
            report_type,
            date,
            notes: form.value(F_NOTES),
        };
        reports::save_report(&self.db, &self.paths.uploads(), self.username(), &new_report)?;
        Ok(())
    }

    pub fn export_selected_report(&mut self) {
        let Some(report) = self.reports_state.selected().and_then(|i| self.reports.get(i)) else {
            return;
        };
        let id = report.id;
        match reports::export_report(
            &self.db,
            &self.paths.uploads(),
            self.username(),
            id,
            &self.paths.exports(),
        ) {
            Ok(path) => self.set_status(StatusLevel::Success, format!("Saved to {}", path.display())),
            Err(e) => self.report_error(&e),
        }
    }

    // Appointments
    pub fn book_appointment(&mut self) {
        match self.build_appointment().and_then(|a| appointments::book(&self.db, self.username(), &a)) {
            Ok(_) => {
                let name = self.username().to_string();
                self.appointment_form = appointment_form(&name);
                self.refresh_user_data();
                self.set_status(StatusLevel::Success, "Appointment confirmed!");
            }
            Err(e) => self.report_error(&e),
        }
    }

    fn build_appointment(&self) -> DeskResult<NewAppointment> {
        let form = &self.appointment_form;
        let pick = |label: &str| form.choice(label);
        Ok(NewAppointment {
            patient_name: form.value(F_PATIENT).to_string(),
            age: form.number(F_AGE),
            gender: Gender::all().get(pick(F_GENDER)).copied().unwrap_or(Gender::PreferNotToSay),
            phone: form.value(F_PHONE).to_string(),
            email: form.value(F_EMAIL).to_string(),
            department: Department::all()
                .get(pick(F_DEPARTMENT))
                .copied()
                .unwrap_or(Department::GeneralPhysician),
            doctor: appointments::doctors()
                .get(pick(F_DOCTOR))
                .map(|d| d.to_string())
                .unwrap_or_default(),
            date: parse_date(form.value(F_DATE))?,
            time: NaiveTime::parse_from_str(form.value(F_TIME).trim(), "%H:%M")
                .map_err(|_| DeskError::validation("Enter the time as HH:MM."))?,
            consultation_type: ConsultationType::all()
                .get(pick(F_CONSULT_TYPE))
                .copied()
                .unwrap_or(ConsultationType::InPerson),
            symptoms: form.value(F_SYMPTOMS).to_string(),
            emergency: form.checked(F_EMERGENCY),
            followup: form.checked(F_FOLLOWUP),
        })
    }

    // Prescriptions
    pub fn generate_suggestion(&mut self) {
        if self.busy() {
            return;
        }
        let symptoms = self.symptom_form.value(F_RX_SYMPTOMS).trim().to_string();
        let prompt = match prescriptions::suggestion_prompt(&symptoms) {
            Ok(p) => p,
            Err(e) => return self.report_error(&e),
        };
        let client = self.gemini.clone();
        let model = self.selected_model.clone();
        self.spawn(
            "Generating suggestion",
            tokio::spawn(async move {
                let text = client.generate(&model, &prompt).await?;
                Ok(TaskOutput::Suggestion { symptoms, text })
            }),
        );
    }

    pub fn selected_prescription(&self) -> Option<&Prescription> {
        self.prescriptions_state.selected().and_then(|i| self.prescriptions.get(i))
    }

    pub fn delete_selected_prescription(&mut self) {
        let Some(id) = self.selected_prescription().map(|p| p.id) else {
            return;
        };
        match prescriptions::delete(&self.db, self.username(), id) {
            Ok(()) => {
                self.refresh_user_data();
                self.set_status(StatusLevel::Info, format!("Deleted prescription #{}", id));
            }
            Err(e) => self.report_error(&e),
        }
    }

    pub fn export_selected_prescription(&mut self) {
        let Some(prescription) = self.selected_prescription().cloned() else {
            return;
        };
        match prescriptions::export(&self.paths.exports(), self.username(), &prescription) {
            Ok(path) => self.set_status(StatusLevel::Success, format!("Saved to {}", path.display())),
            Err(e) => self.report_error(&e),
        }
    }

    // Pharmacy
    pub fn adjust_pending_qty(&mut self, forward: bool) {
        if let Some(qty) = self.catalog_state.selected().and_then(|i| self.pending_qty.get_mut(i)) {
            *qty = if forward { (*qty + 1).min(MAX_QTY) } else { qty.saturating_sub(1) };
        }
    }

    pub fn add_selected_to_cart(&mut self) {
        let Some(i) = self.catalog_state.selected() else {
            return;
        };
        let (Some(medicine), Some(&qty)) = (self.catalog.get(i).copied(), self.pending_qty.get(i)) else {
            return;
        };
        match self.cart.add(&medicine, qty) {
            Ok(()) => self.set_status(StatusLevel::Success, format!("Added {} to cart", medicine.name)),
            Err(e) => self.report_error(&e),
        }
    }

    pub fn checkout(&mut self) {
        match self.cart.checkout() {
            Ok(order) => {
                info!("Demo order placed: {} items, {}", order.lines.len(), pharmacy::format_rupees(order.total));
                self.pending_qty.iter_mut().for_each(|q| *q = 0);
                self.set_status(
                    StatusLevel::Success,
                    format!("Order placed (demo). Total {}", pharmacy::format_rupees(order.total)),
                );
            }
            Err(e) => self.report_error(&e),
        }
    }

    // Dashboard
    pub fn generate_tip(&mut self) {
        if self.busy() {
            return;
        }
        let client = self.gemini.clone();
        let model = self.selected_model.clone();
        self.spawn(
            "Generating tip",
            tokio::spawn(async move {
                let text = client.generate(&model, dashboard::daily_tip_prompt()).await?;
                Ok(TaskOutput::Tip(text))
            }),
        );
    }

    // Background tasks
    pub fn tick(&mut self) {
        if self.pending.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }

    /// Collect finished background tasks.
    pub async fn poll_tasks(&mut self) {
        if self.pending.as_ref().map(|t| t.handle.is_finished()).unwrap_or(false) {
            if let Some(task) = self.pending.take() {
                match task.handle.await {
                    Ok(Ok(output)) => self.apply_output(output),
                    Ok(Err(e)) => {
                        warn!("{} failed: {}", task.label, e);
                        self.report_error(&e);
                    }
                    Err(e) => self.set_status(StatusLevel::Error, format!("{} failed: {}", task.label, e)),
                }
            }
        }

        if self.speech_task.as_ref().map(|t| t.is_finished()).unwrap_or(false) {
            if let Some(task) = self.speech_task.take() {
                if let Ok(Err(e)) = task.await {
                    warn!("Speech playback failed: {}", e);
                    self.set_status(StatusLevel::Warning, "TTS failed in this environment.");
                }
            }
        }
    }

    fn apply_output(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::Transcript { source, text } => {
                if text.is_empty() {
                    let msg = match source {
                        TranscriptSource::Microphone => "Could not transcribe audio.",
                        TranscriptSource::Upload => "Could not transcribe uploaded audio.",
                    };
                    self.set_status(StatusLevel::Error, msg);
                    return;
                }
                self.set_status(StatusLevel::Info, format!("You said: {}", text));
                match source {
                    TranscriptSource::Microphone => self.recorded_transcript = Some(text),
                    TranscriptSource::Upload => self.uploaded_transcript = Some(text),
                }
            }
            TaskOutput::Answer { question, answer, language } => {
                self.history.push(question, answer.clone());
                self.recorded_transcript = None;
                self.uploaded_transcript = None;
                self.consult_form.set_value(F_QUESTION, "");
                self.set_status(StatusLevel::Success, "AI response received");
                self.speak(answer, language);
            }
            TaskOutput::ImageAnalysis { file_name, text } => {
                self.image_result = Some((file_name, text));
                self.set_status(StatusLevel::Success, "Image analysis complete");
            }
            TaskOutput::Suggestion { symptoms, text } => {
                match prescriptions::save(&self.db, self.username(), &symptoms, &text) {
                    Ok(_) => {
                        self.symptom_form.clear_text();
                        self.refresh_user_data();
                        self.prescriptions_state.select(Some(0));
                        self.set_status(StatusLevel::Success, "Saved suggestion to your prescriptions.");
                    }
                    Err(e) => {
                        self.set_status(StatusLevel::Error, format!("Failed to save prescription: {}", e));
                    }
                }
            }
            TaskOutput::Tip(tip) => {
                self.tip = Some(tip);
            }
        }
    }

    // Model picker
    pub fn open_model_picker(&mut self) {
        let current = self
            .available_models
            .iter()
            .position(|m| m == &self.selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav(&mut self, down: bool) {
        list_nav(&mut self.model_picker_state, self.available_models.len(), down);
    }

    pub fn select_model(&mut self) {
        if let Some(model) = self.model_picker_state.selected().and_then(|i| self.available_models.get(i)) {
            self.selected_model = model.clone();
            self.show_model_picker = false;
            if let Err(e) = Config::save_default_model(&self.selected_model) {
                warn!("Could not save model choice: {}", e);
            }
        }
    }

    // API key entry
    pub fn save_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if key.is_empty() {
            return;
        }
        self.gemini = GeminiClient::new(&key);
        self.config.gemini_api_key = Some(key.clone());
        self.show_api_key_input = false;
        self.api_key_input.clear();
        match Config::save_api_key(&key) {
            Ok(()) => self.set_status(StatusLevel::Success, "Gemini API key saved"),
            Err(e) => self.set_status(StatusLevel::Warning, format!("Key in use but not saved: {}", e)),
        }
    }
}

pub fn list_nav(state: &mut ListState, len: usize, down: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = state.selected().unwrap_or(0);
    state.select(Some(if down { (i + 1).min(len - 1) } else { i.saturating_sub(1) }));
}

fn clamp_selection(state: &mut ListState, len: usize) {
    match (state.selected(), len) {
        (_, 0) => state.select(None),
        (None, _) => state.select(Some(0)),
        (Some(i), _) if i >= len => state.select(Some(len - 1)),
        _ => {}
    }
}

fn parse_date(value: &str) -> DeskResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DeskError::validation("Enter the date as YYYY-MM-DD."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        paths.ensure().unwrap();
        let db = HealthDb::open_in_memory().unwrap();
        (App::new(db, paths, Config::new()), dir)
    }

    fn type_into(form: &mut Form, label: &str, text: &str) {
        form.focused = form.fields.iter().position(|f| f.label == label).unwrap();
        for c in text.chars() {
            form.input_char(c);
        }
    }

    fn signed_in() -> (App, tempfile::TempDir) {
        let (mut app, dir) = app();
        auth::signup(&app.db, "ana", "pw", "pw").unwrap();
        type_into(&mut app.auth_form, F_USERNAME, "ana");
        type_into(&mut app.auth_form, F_PASSWORD, "pw");
        app.submit_auth();
        (app, dir)
    }

    #[test]
    fn test_signup_switches_to_login() {
        let (mut app, _dir) = app();
        app.toggle_auth_screen();
        assert_eq!(app.screen, Screen::Signup);
        type_into(&mut app.auth_form, F_USERNAME, "bob");
        type_into(&mut app.auth_form, F_PASSWORD, "pw");
        type_into(&mut app.auth_form, F_CONFIRM, "pw");
        app.submit_auth();
        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.auth_form.value(F_USERNAME), "bob");
        assert_eq!(app.status.as_ref().unwrap().level, StatusLevel::Success);
    }

    #[test]
    fn test_login_and_logout() {
        let (mut app, _dir) = signed_in();
        assert_eq!(app.screen, Screen::Main);
        assert_eq!(app.username(), "ana");
        assert_eq!(app.appointment_form.value(F_PATIENT), "ana");

        app.history.push("q", "a");
        type_into(&mut app.consult_form, F_QUESTION, "my symptoms");
        type_into(&mut app.symptom_form, F_RX_SYMPTOMS, "dry cough");
        app.adjust_pending_qty(true);
        app.logout();
        assert_eq!(app.screen, Screen::Login);
        assert!(app.session.is_none());
        assert!(app.history.is_empty());
        assert!(app.pending_qty.iter().all(|&q| q == 0));

        auth::signup(&app.db, "bob", "pw", "pw").unwrap();
        type_into(&mut app.auth_form, F_USERNAME, "bob");
        type_into(&mut app.auth_form, F_PASSWORD, "pw");
        app.submit_auth();
        assert_eq!(app.username(), "bob");
        assert_eq!(app.consult_form.value(F_QUESTION), "");
        assert_eq!(app.symptom_form.value(F_RX_SYMPTOMS), "");
        assert_eq!(app.appointment_form.value(F_PATIENT), "bob");
    }

    #[tokio::test]
    async fn test_answer_keeps_language_it_was_asked_in() {
        let (mut app, _dir) = signed_in();
        app.gemini = GeminiClient::new("");
        let language_field = app.consult_form.fields.iter().position(|f| f.label == F_LANGUAGE).unwrap();
        app.consult_form.focused = language_field;
        app.consult_form.step(true);
        assert_eq!(app.selected_language(), Language::Hindi);

        type_into(&mut app.consult_form, F_QUESTION, "Is ginger good for nausea?");
        app.ask();
        app.consult_form.focused = language_field;
        app.consult_form.step(true);
        assert_eq!(app.selected_language(), Language::Spanish);

        let task = app.pending.take().unwrap();
        match task.handle.await.unwrap().unwrap() {
            TaskOutput::Answer { language, .. } => assert_eq!(language, Language::Hindi),
            other => panic!("expected an answer, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_login_reports_error() {
        let (mut app, _dir) = app();
        type_into(&mut app.auth_form, F_USERNAME, "ghost");
        type_into(&mut app.auth_form, F_PASSWORD, "pw");
        app.submit_auth();
        assert_eq!(app.screen, Screen::Login);
        let status = app.status.unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert_eq!(status.text, "Invalid username or password.");
    }

    #[test]
    fn test_book_appointment_refreshes_lists() {
        let (mut app, _dir) = signed_in();
        app.select_tab(Tab::Appointments);
        app.appointment_form.set_value(F_DATE, "2024-07-01");
        app.book_appointment();
        assert_eq!(app.appointments.len(), 1);
        assert_eq!(app.stats.appointments, 1);
        assert_eq!(app.per_month, vec![("2024-07".to_string(), 1)]);

        app.appointment_form.set_value(F_TIME, "noon");
        app.book_appointment();
        assert_eq!(app.status.unwrap().text, "Enter the time as HH:MM.");
    }

    #[test]
    fn test_save_and_export_report() {
        let (mut app, dir) = signed_in();
        let source = dir.path().join("lipid.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        app.report_form.set_value(F_REPORT_FILE, source.to_string_lossy().to_string());
        app.save_report();
        assert_eq!(app.reports.len(), 1);
        assert_eq!(app.reports_state.selected(), Some(0));

        app.export_selected_report();
        assert_eq!(app.status.as_ref().unwrap().level, StatusLevel::Success);
        assert_eq!(std::fs::read_dir(app.paths.exports()).unwrap().count(), 1);
    }

    #[test]
    fn test_suggestion_output_is_saved() {
        let (mut app, _dir) = signed_in();
        app.apply_output(TaskOutput::Suggestion {
            symptoms: "sore throat".to_string(),
            text: "Warm salt water gargles.".to_string(),
        });
        assert_eq!(app.prescriptions.len(), 1);
        assert_eq!(app.selected_prescription().unwrap().symptoms, "sore throat");

        app.delete_selected_prescription();
        assert!(app.prescriptions.is_empty());
        assert_eq!(app.prescriptions_state.selected(), None);
    }

    #[test]
    fn test_transcript_feeds_question() {
        let (mut app, _dir) = signed_in();
        app.apply_output(TaskOutput::Transcript {
            source: TranscriptSource::Upload,
            text: String::new(),
        });
        assert_eq!(app.status.as_ref().unwrap().text, "Could not transcribe uploaded audio.");

        app.apply_output(TaskOutput::Transcript {
            source: TranscriptSource::Microphone,
            text: "I have a headache".to_string(),
        });
        assert_eq!(app.recorded_transcript.as_deref(), Some("I have a headache"));

        app.speak_answers = false;
        app.apply_output(TaskOutput::Answer {
            question: "I have a headache".to_string(),
            answer: "Rest and hydrate.".to_string(),
            language: Language::English,
        });
        assert!(app.recorded_transcript.is_none());
        assert_eq!(app.visible_history().len(), 1);
    }

    #[test]
    fn test_cart_flow() {
        let (mut app, _dir) = signed_in();
        app.add_selected_to_cart();
        assert_eq!(app.status.as_ref().unwrap().text, "Choose a quantity first.");
        app.adjust_pending_qty(true);
        app.adjust_pending_qty(true);
        app.add_selected_to_cart();
        assert_eq!(app.cart.total(), 100);
        app.checkout();
        assert!(app.cart.is_empty());
        assert_eq!(app.pending_qty, vec![0, 0, 0]);
    }

    #[test]
    fn test_record_seconds_bounds() {
        let (mut app, _dir) = app();
        for _ in 0..20 {
            app.adjust_record_seconds(true);
        }
        assert_eq!(app.record_seconds, 12);
        for _ in 0..20 {
            app.adjust_record_seconds(false);
        }
        assert_eq!(app.record_seconds, 3);
    }
}

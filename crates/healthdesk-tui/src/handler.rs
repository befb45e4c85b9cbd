use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{list_nav, App, InputMode, PaneFocus, Screen, Tab, F_AUDIO};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick();
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return;
    }

    match app.screen {
        Screen::Login | Screen::Signup => handle_auth(app, key),
        Screen::Main => match app.input_mode {
            InputMode::Normal => handle_main_normal(app, key),
            InputMode::Editing => handle_main_editing(app, key),
        },
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
        }
        KeyCode::Enter => app.save_api_key(),
        KeyCode::Backspace => {
            app.api_key_input.pop();
        }
        KeyCode::Char(c) => app.api_key_input.push(c),
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav(true),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav(false),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_auth(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => app.toggle_auth_screen(),
        KeyCode::Enter => app.submit_auth(),
        KeyCode::Tab | KeyCode::Down => app.auth_form.next(),
        KeyCode::BackTab | KeyCode::Up => app.auth_form.prev(),
        KeyCode::Backspace => app.auth_form.backspace(),
        KeyCode::Char(c) => app.auth_form.input_char(c),
        _ => {}
    }
}

fn handle_main_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Tabs
        KeyCode::Char(c @ '1'..='6') => {
            let idx = c as usize - '1' as usize;
            app.select_tab(Tab::all()[idx]);
        }
        KeyCode::Char(']') => app.next_tab(true),
        KeyCode::Char('[') => app.next_tab(false),
        KeyCode::Tab => app.cycle_focus(),

        // Start editing the current tab's form
        KeyCode::Char('i') | KeyCode::Enter if app.focus == PaneFocus::Form => {
            if app.active_form_mut().is_some() {
                app.input_mode = InputMode::Editing;
            }
        }

        // List navigation
        KeyCode::Char('j') | KeyCode::Down => nav_focused_list(app, true),
        KeyCode::Char('k') | KeyCode::Up => nav_focused_list(app, false),

        // Session
        KeyCode::Char('K') => {
            app.api_key_input.clear();
            app.show_api_key_input = true;
        }
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('L') => app.logout(),

        _ => handle_tab_action(app, key),
    }
}

fn nav_focused_list(app: &mut App, down: bool) {
    match (app.tab, app.focus) {
        (Tab::Reports, PaneFocus::Records) => list_nav(&mut app.reports_state, app.reports.len(), down),
        (Tab::Pharmacy, PaneFocus::Records) => {
            list_nav(&mut app.prescriptions_state, app.prescriptions.len(), down)
        }
        (Tab::Pharmacy, PaneFocus::Catalog) => list_nav(&mut app.catalog_state, app.catalog.len(), down),
        _ => {}
    }
}

/// Single-letter actions that only make sense on one tab.
fn handle_tab_action(app: &mut App, key: KeyEvent) {
    match (app.tab, key.code) {
        (Tab::Consult, KeyCode::Char('r')) => app.start_recording(),
        (Tab::Consult, KeyCode::Char('u')) => app.transcribe_upload(),
        (Tab::Consult, KeyCode::Char('s')) => app.ask(),
        (Tab::Consult, KeyCode::Char('c')) => app.clear_history(),
        (Tab::Consult, KeyCode::Char('v')) => app.speak_answers = !app.speak_answers,
        (Tab::Consult, KeyCode::Char('+')) => app.adjust_record_seconds(true),
        (Tab::Consult, KeyCode::Char('-')) => app.adjust_record_seconds(false),

        (Tab::Imaging, KeyCode::Char('s')) => app.analyze_image(),

        (Tab::Reports, KeyCode::Char('s')) => app.save_report(),
        (Tab::Reports, KeyCode::Char('e')) => app.export_selected_report(),

        (Tab::Appointments, KeyCode::Char('s')) => app.book_appointment(),

        (Tab::Pharmacy, KeyCode::Char('s')) => app.generate_suggestion(),
        (Tab::Pharmacy, KeyCode::Char('d')) if app.focus == PaneFocus::Records => {
            app.delete_selected_prescription()
        }
        (Tab::Pharmacy, KeyCode::Char('e')) if app.focus == PaneFocus::Records => {
            app.export_selected_prescription()
        }
        (Tab::Pharmacy, KeyCode::Char('+')) => app.adjust_pending_qty(true),
        (Tab::Pharmacy, KeyCode::Char('-')) => app.adjust_pending_qty(false),
        (Tab::Pharmacy, KeyCode::Char('a')) => app.add_selected_to_cart(),
        (Tab::Pharmacy, KeyCode::Char('o')) => app.checkout(),

        (Tab::Dashboard, KeyCode::Char('t')) => app.generate_tip(),
        (Tab::Dashboard, KeyCode::Char('g')) => app.refresh_user_data(),

        _ => {}
    }
}

fn handle_main_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            submit_form(app);
            return;
        }
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            return;
        }
        _ => {}
    }

    let Some(form) = app.active_form_mut() else {
        app.input_mode = InputMode::Normal;
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.next(),
        KeyCode::BackTab | KeyCode::Up => form.prev(),
        KeyCode::Left => form.step(false),
        KeyCode::Right => form.step(true),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(c) => form.input_char(c),
        _ => {}
    }
}

/// Enter in a form runs the tab's primary action.
fn submit_form(app: &mut App) {
    match app.tab {
        Tab::Consult => {
            let on_audio = app
                .consult_form
                .fields
                .get(app.consult_form.focused)
                .map(|f| f.label == F_AUDIO)
                .unwrap_or(false);
            if on_audio {
                app.transcribe_upload();
            } else {
                app.ask();
            }
        }
        Tab::Imaging => app.analyze_image(),
        Tab::Reports => app.save_report(),
        Tab::Appointments => app.book_appointment(),
        Tab::Pharmacy => app.generate_suggestion(),
        Tab::Dashboard => {}
    }
}

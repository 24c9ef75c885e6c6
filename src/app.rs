use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::debug;
use tokio::sync::mpsc;

use crate::actions::{Request, RequestId, Response};
use crate::{
    api::ChatRequest,
    config::ServerInfo,
    error::ErrorKind,
    route::{RouteRequest, RouteResult},
    ui::{ChatRole, Page, PopupKind, RouteField, UIState as UIApp},
};

const ROUTE_SEPARATOR_WIDTH: usize = 40;

pub struct AppController {
    pub ui_app: UIApp,
    req_tx: mpsc::Sender<Request>,
    next_request_id: RequestId,
}

impl AppController {
    pub fn new(servers: ServerInfo, req_tx: mpsc::Sender<Request>) -> Self {
        Self { ui_app: UIApp::new(servers), req_tx, next_request_id: 1 }
    }

    /// Returns `true` once quitting was requested.
    pub async fn handle_key_event(&mut self, key: KeyEvent) -> Result<bool> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
            self.quit();
            return Ok(true);
        }

        // Any key closes a message box
        if self.ui_app.popup.is_some() {
            self.ui_app.dismiss_popup();
            return Ok(false);
        }

        // The wait indicator only accepts cancellation
        if self.ui_app.pending_route.is_some() {
            if key.code == KeyCode::Esc {
                self.cancel_route();
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Tab => self.ui_app.next_page(),
            KeyCode::BackTab => self.ui_app.previous_page(),
            KeyCode::F(n @ 1..=4) => self.ui_app.show_page(Page::ALL[n as usize - 1]),
            _ => match self.ui_app.page {
                Page::Home | Page::Info => return Ok(self.handle_browse_key(key.code)),
                Page::Route => self.handle_route_key(key.code)?,
                Page::Chat => self.handle_chat_key(key.code, ctrl)?,
            },
        }
        Ok(self.should_quit())
    }

    fn handle_browse_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.quit();
                true
            }
            KeyCode::Enter if self.ui_app.page == Page::Home => {
                self.ui_app.show_page(Page::Info);
                false
            }
            _ => false,
        }
    }

    fn handle_route_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Esc => self.ui_app.show_page(Page::Home),
            KeyCode::Up => self.ui_app.route_field = self.ui_app.route_field.previous(),
            KeyCode::Down => self.ui_app.route_field = self.ui_app.route_field.next(),
            KeyCode::Left if self.ui_app.route_field == RouteField::Platform => {
                self.ui_app.platform = self.ui_app.platform.previous();
            }
            KeyCode::Right if self.ui_app.route_field == RouteField::Platform => {
                self.ui_app.platform = self.ui_app.platform.next();
            }
            KeyCode::Enter => self.plan_route(),
            KeyCode::Backspace => {
                if let Some(input) = self.ui_app.focused_input_mut() {
                    input.pop();
                }
            }
            KeyCode::Char(c) if c.is_ascii_alphanumeric() => {
                if let Some(input) = self.ui_app.focused_input_mut() {
                    input.push(c.to_ascii_uppercase());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_chat_key(&mut self, code: KeyCode, ctrl: bool) -> Result<()> {
        match code {
            KeyCode::Esc => {
                if let Some(id) = self.ui_app.pending_chat {
                    self.send_cancel(id);
                } else {
                    self.ui_app.show_page(Page::Home);
                }
            }
            KeyCode::Char('l') if ctrl => self.ui_app.clear_chat(),
            KeyCode::Enter => self.send_chat(),
            KeyCode::Backspace => {
                self.ui_app.chat_input.pop();
            }
            KeyCode::Char(c) if !ctrl => self.ui_app.chat_input.push(c),
            _ => {}
        }
        Ok(())
    }

    fn plan_route(&mut self) {
        let request = match RouteRequest::new(
            &self.ui_app.departure_input,
            &self.ui_app.arrival_input,
            self.ui_app.platform,
        ) {
            Ok(request) => request,
            Err(e) => {
                self.ui_app.show_popup(PopupKind::Warning, "Input error", e.to_string());
                return;
            }
        };

        let id = self.allocate_id();
        if self
            .req_tx
            .try_send(Request::PlanRoute { id, request: request.clone() })
            .is_ok()
        {
            debug!("Dispatched route request {} for {:?}", id, request);
            self.ui_app.pending_route = Some((id, request));
        } else {
            self.ui_app
                .show_popup(PopupKind::Error, "Error", "The fetch worker is not available");
        }
    }

    fn send_chat(&mut self) {
        if self.ui_app.pending_chat.is_some() {
            self.ui_app.status_message = "Please wait for the current answer".to_string();
            return;
        }
        let request = match ChatRequest::new(&self.ui_app.chat_input) {
            Ok(request) => request,
            Err(e) => {
                self.ui_app.show_popup(PopupKind::Warning, "Input error", e.to_string());
                return;
            }
        };

        let id = self.allocate_id();
        self.ui_app.push_chat(ChatRole::User, request.prompt());
        self.ui_app.chat_input.clear();
        if self.req_tx.try_send(Request::Chat { id, request }).is_ok() {
            self.ui_app.pending_chat = Some(id);
        } else {
            self.ui_app
                .push_chat(ChatRole::Error, "Sorry, the assistant is not available right now.");
        }
    }

    fn cancel_route(&mut self) {
        if let Some((id, _)) = &self.ui_app.pending_route {
            let id = *id;
            self.send_cancel(id);
        }
    }

    fn send_cancel(&mut self, id: RequestId) {
        // The dispatcher still answers with a Cancelled outcome, which clears the pending flag
        if self.req_tx.try_send(Request::Cancel { id }).is_ok() {
            self.ui_app.status_message = "Cancelling…".to_string();
        }
    }

    fn allocate_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn quit(&mut self) {
        self.ui_app.quit();
    }

    pub fn should_quit(&self) -> bool {
        self.ui_app.should_quit
    }

    pub fn process_response(&mut self, resp: Response) {
        match resp {
            Response::RouteFinished { id, outcome } => {
                let request = match self.ui_app.pending_route.take() {
                    Some((pending, request)) if pending == id => request,
                    other => {
                        debug!("Ignoring stale route response {}", id);
                        self.ui_app.pending_route = other;
                        return;
                    }
                };
                self.ui_app.status_message.clear();
                match outcome {
                    Ok(result) => {
                        self.ui_app.route_display = format_route(&request, &result);
                        self.ui_app
                            .show_popup(PopupKind::Info, "Success", "Route planning complete!");
                    }
                    Err(e) if e.kind() == ErrorKind::Cancelled => {
                        self.ui_app.status_message = "Route request cancelled".to_string();
                    }
                    Err(e) => {
                        let message = e.to_string();
                        self.ui_app.route_display = format!("Failed to fetch route: {}", message);
                        self.ui_app.show_popup(PopupKind::Error, "Error", message);
                    }
                }
            }
            Response::ChatFinished { id, outcome } => {
                if self.ui_app.pending_chat != Some(id) {
                    debug!("Ignoring stale chat response {}", id);
                    return;
                }
                self.ui_app.pending_chat = None;
                self.ui_app.status_message.clear();
                match outcome {
                    Ok(result) => self.ui_app.push_chat(ChatRole::Assistant, result.response_text),
                    Err(e) => self.ui_app.push_chat(
                        ChatRole::Error,
                        format!(
                            "Sorry, an error occurred: {}\nPlease try again later or check your network connection.",
                            e
                        ),
                    ),
                }
            }
        }
    }
}

fn format_route(request: &RouteRequest, result: &RouteResult) -> String {
    format!(
        "{} → {} route\n{}\nRoute: {}\n\nRoute file saved: {} ({})",
        request.departure(),
        request.arrival(),
        "=".repeat(ROUTE_SEPARATOR_WIDTH),
        result.airway_text,
        result.display_file_name,
        result.file_path.display()
    )
}

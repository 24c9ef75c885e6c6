use crate::{
    actions::RequestId,
    config::ServerInfo,
    route::{Platform, RouteRequest},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};

// Layout constants for better maintainability
const NAVBAR_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 3;
const MARGIN: u16 = 1;
const INPUT_HEIGHT: u16 = 3;
const POPUP_WIDTH_PERCENT: u16 = 50;
const POPUP_HEIGHT: u16 = 7;

pub const WELCOME_MESSAGE: &str = "Hello! I'm the QuanQuan assistant. Ask me anything about flight simulation, procedures or the platform.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Route,
    Info,
    Chat,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Home, Page::Route, Page::Info, Page::Chat];

    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "F1 Home",
            Page::Route => "F2 Route Planning",
            Page::Info => "F3 Server Info",
            Page::Chat => "F4 AI Assistant",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteField {
    Departure,
    Arrival,
    Platform,
}

impl RouteField {
    pub fn next(self) -> Self {
        match self {
            RouteField::Departure => RouteField::Arrival,
            RouteField::Arrival => RouteField::Platform,
            RouteField::Platform => RouteField::Departure,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            RouteField::Departure => RouteField::Platform,
            RouteField::Arrival => RouteField::Departure,
            RouteField::Platform => RouteField::Arrival,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub kind: PopupKind,
    pub title: String,
    pub message: String,
}

pub struct UIState {
    pub page: Page,
    pub should_quit: bool,
    pub servers: ServerInfo,
    // Route planning form
    pub departure_input: String,
    pub arrival_input: String,
    pub platform: Platform,
    pub route_field: RouteField,
    pub route_display: String,
    pub pending_route: Option<(RequestId, RouteRequest)>,
    // Assistant
    pub chat_input: String,
    pub chat_history: Vec<ChatEntry>,
    pub pending_chat: Option<RequestId>,
    // Status and modal messages
    pub status_message: String,
    pub popup: Option<Popup>,
}

impl UIState {
    pub fn new(servers: ServerInfo) -> Self {
        let mut state = Self {
            page: Page::Home,
            should_quit: false,
            servers,
            departure_input: String::new(),
            arrival_input: String::new(),
            platform: Platform::default(),
            route_field: RouteField::Departure,
            route_display: String::new(),
            pending_route: None,
            chat_input: String::new(),
            chat_history: Vec::new(),
            pending_chat: None,
            status_message: String::new(),
            popup: None,
        };
        state.clear_chat();
        state
    }

    pub fn show_page(&mut self, page: Page) {
        self.page = page;
    }

    pub fn next_page(&mut self) {
        self.page = self.page.next();
    }

    pub fn previous_page(&mut self) {
        self.page = self.page.previous();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Drop the transcript and put the welcome message back
    pub fn clear_chat(&mut self) {
        self.chat_history.clear();
        self.push_chat(ChatRole::Assistant, WELCOME_MESSAGE);
    }

    pub fn push_chat(&mut self, role: ChatRole, text: impl Into<String>) {
        self.chat_history.push(ChatEntry {
            role,
            text: text.into(),
        });
    }

    pub fn show_popup(&mut self, kind: PopupKind, title: &str, message: impl Into<String>) {
        self.popup = Some(Popup {
            kind,
            title: title.to_string(),
            message: message.into(),
        });
    }

    pub fn dismiss_popup(&mut self) {
        self.popup = None;
    }

    /// Text field currently receiving keystrokes, if any.
    pub fn focused_input_mut(&mut self) -> Option<&mut String> {
        match self.page {
            Page::Route => match self.route_field {
                RouteField::Departure => Some(&mut self.departure_input),
                RouteField::Arrival => Some(&mut self.arrival_input),
                RouteField::Platform => None,
            },
            Page::Chat => Some(&mut self.chat_input),
            Page::Home | Page::Info => None,
        }
    }
}

pub fn render_ui(f: &mut Frame, app: &UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(MARGIN)
        .constraints([
            Constraint::Length(NAVBAR_HEIGHT), // Navigation tabs
            Constraint::Min(10),               // Current page
            Constraint::Length(STATUS_HEIGHT), // Status bar
            Constraint::Length(FOOTER_HEIGHT), // Footer
        ])
        .split(f.area());

    render_navbar(f, chunks[0], app);

    match app.page {
        Page::Home => render_home(f, chunks[1]),
        Page::Route => render_route_page(f, chunks[1], app),
        Page::Info => render_info_page(f, chunks[1], app),
        Page::Chat => render_chat_page(f, chunks[1], app),
    }

    render_status(f, chunks[2], app);
    render_footer(f, chunks[3], app.page);

    if app.pending_route.is_some() {
        render_wait_indicator(f, f.area());
    }
    if let Some(popup) = &app.popup {
        render_popup(f, f.area(), popup);
    }
}

fn render_navbar(f: &mut Frame, area: Rect, app: &UIState) {
    let titles: Vec<Line> = Page::ALL.iter().map(|p| Line::from(p.title())).collect();
    let tabs = Tabs::new(titles)
        .select(app.page.index())
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
        .divider(" │ ")
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(Span::styled(
                    " QuanQuan VFP ",
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )),
        );

    f.render_widget(tabs, area);
}

fn render_home(f: &mut Frame, area: Rect) {
    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "QuanQuan Virtual Flight Platform",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Professional Flight Sim VFP",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(""),
        Line::from(vec![
            Span::styled("Press ", Style::default().fg(Color::Gray)),
            Span::styled("ENTER", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::styled(" to get started", Style::default().fg(Color::Gray)),
        ]),
    ];

    let home = Paragraph::new(Text::from(content))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        );

    f.render_widget(home, area);
}

fn render_route_page(f: &mut Frame, area: Rect, app: &UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Min(5),
        ])
        .split(area);

    render_input(
        f,
        chunks[0],
        "Departure airport (ICAO, e.g. ZBAA)",
        &app.departure_input,
        app.route_field == RouteField::Departure,
    );
    render_input(
        f,
        chunks[1],
        "Arrival airport (ICAO, e.g. ZSPD)",
        &app.arrival_input,
        app.route_field == RouteField::Arrival,
    );
    render_input(
        f,
        chunks[2],
        "Simulator platform (←/→ to change)",
        &format!("◀ {} ▶", app.platform),
        app.route_field == RouteField::Platform,
    );

    let display = if app.route_display.is_empty() {
        "Enter both airports and press ENTER to fetch a route."
    } else {
        app.route_display.as_str()
    };
    let result = Paragraph::new(display)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title("Route"),
        );

    f.render_widget(result, chunks[3]);
}

fn render_input(f: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let border = if focused {
        Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let text = if focused {
        format!("{}▏", value)
    } else {
        value.to_string()
    };
    let input = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title.to_string()),
    );

    f.render_widget(input, area);
}

fn render_info_page(f: &mut Frame, area: Rect, app: &UIState) {
    let servers = &app.servers;
    let label = Style::default().fg(Color::Gray);
    let value = Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD);

    let item = |name: &'static str, text: &str| {
        Line::from(vec![
            Span::styled(format!("{:<24}", name), label),
            Span::styled(text.to_string(), value),
        ])
    };

    let content = vec![
        Line::from(""),
        item("TeamSpeak address", &servers.teamspeak),
        item("Multiplayer server", &servers.multiplayer_server),
        item("Platform administrator", &servers.administrator),
        item("Registration site", &servers.register_url),
        item("Community group", &servers.community_group),
        item("Platform status", &servers.status),
        Line::from(""),
        Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Green)),
            Span::styled(servers.banner.clone(), Style::default().fg(Color::White)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!("Register your callsign at {}", servers.register_url),
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let info = Paragraph::new(Text::from(content)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue))
            .title("Platform Information"),
    );

    f.render_widget(info, area);
}

fn render_chat_page(f: &mut Frame, area: Rect, app: &UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(INPUT_HEIGHT)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    for entry in &app.chat_history {
        let (who, color) = match entry.role {
            ChatRole::User => ("You:", Color::LightGreen),
            ChatRole::Assistant => ("Assistant:", Color::LightBlue),
            ChatRole::Error => ("Assistant:", Color::LightRed),
        };
        lines.push(Line::from(Span::styled(
            who,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for text_line in entry.text.lines() {
            lines.push(Line::from(text_line.to_string()));
        }
        lines.push(Line::from(""));
    }

    // Keep the latest messages in view
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    let history = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title("AI Assistant"),
        );
    f.render_widget(history, chunks[0]);

    render_input(f, chunks[1], "Your question", &app.chat_input, true);
}

fn render_status(f: &mut Frame, area: Rect, app: &UIState) {
    // Determine status text priority (owned String)
    let text = if app.pending_route.is_some() {
        "Fetching route information…".to_string()
    } else if app.pending_chat.is_some() {
        "Waiting for the assistant…".to_string()
    } else if !app.status_message.is_empty() {
        app.status_message.clone()
    } else {
        String::new()
    };

    let status = Paragraph::new(Text::from(Line::from(vec![Span::styled(
        text,
        Style::default().fg(Color::White),
    )])))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue))
            .title("Status"),
    );

    f.render_widget(status, area);
}

fn render_footer(f: &mut Frame, area: Rect, page: Page) {
    let key = |k: &'static str, color: Color| {
        Span::styled(k, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };
    let text = |t: &'static str| Span::styled(t, Style::default().fg(Color::White));

    let mut spans = vec![key("TAB ", Color::Yellow), text("Switch page • ")];
    match page {
        Page::Home => {
            spans.extend([key("ENTER ", Color::Green), text("Start • ")]);
            spans.extend([key("Q ", Color::Red), text("Quit")]);
        }
        Page::Info => {
            spans.extend([key("Q ", Color::Red), text("Quit")]);
        }
        Page::Route => {
            spans.extend([key("↑/↓ ", Color::Yellow), text("Field • ")]);
            spans.extend([key("←/→ ", Color::Cyan), text("Platform • ")]);
            spans.extend([key("ENTER ", Color::Green), text("Fetch route • ")]);
            spans.extend([key("ESC ", Color::Red), text("Cancel/Back")]);
        }
        Page::Chat => {
            spans.extend([key("ENTER ", Color::Green), text("Send • ")]);
            spans.extend([key("CTRL+L ", Color::Cyan), text("Clear chat • ")]);
            spans.extend([key("ESC ", Color::Red), text("Cancel/Back")]);
        }
    }

    let controls = Paragraph::new(Text::from(Line::from(spans)))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray))
                .title("Controls"),
        );

    f.render_widget(controls, area);
}

fn render_wait_indicator(f: &mut Frame, area: Rect) {
    let area = centered_rect(area, POPUP_WIDTH_PERCENT, POPUP_HEIGHT);
    let wait = Paragraph::new(Text::from(vec![
        Line::from(""),
        Line::from("Fetching route information..."),
        Line::from(Span::styled(
            "ESC to cancel",
            Style::default().fg(Color::Gray),
        )),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title("Please wait"),
    );

    f.render_widget(Clear, area);
    f.render_widget(wait, area);
}

fn render_popup(f: &mut Frame, area: Rect, popup: &Popup) {
    let area = centered_rect(area, POPUP_WIDTH_PERCENT, POPUP_HEIGHT);
    let color = match popup.kind {
        PopupKind::Info => Color::Green,
        PopupKind::Warning => Color::Yellow,
        PopupKind::Error => Color::Red,
    };
    let body = Paragraph::new(Text::from(vec![
        Line::from(popup.message.clone()),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to close",
            Style::default().fg(Color::Gray),
        )),
    ]))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .title(popup.title.clone()),
    );

    f.render_widget(Clear, area);
    f.render_widget(body, area);
}

fn centered_rect(area: Rect, width_percent: u16, height: u16) -> Rect {
    let width = ((area.width as u32 * width_percent as u32 / 100) as u16)
        .max(20)
        .min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_page_cycling() {
        assert_eq!(Page::Chat.next(), Page::Home);
        assert_eq!(Page::Home.previous(), Page::Chat);
        assert_eq!(RouteField::Platform.next(), RouteField::Departure);
    }

    #[test]
    fn test_clear_chat_restores_welcome() {
        let mut state = UIState::new(ServerInfo::default());
        state.push_chat(ChatRole::User, "hello");
        state.clear_chat();
        assert_eq!(state.chat_history.len(), 1);
        assert_eq!(state.chat_history[0].text, WELCOME_MESSAGE);
    }

    #[test]
    fn test_focused_input_follows_page() {
        let mut state = UIState::new(ServerInfo::default());
        assert!(state.focused_input_mut().is_none());
        state.show_page(Page::Route);
        state.focused_input_mut().unwrap().push('Z');
        assert_eq!(state.departure_input, "Z");
        state.route_field = RouteField::Platform;
        assert!(state.focused_input_mut().is_none());
    }

    #[test]
    fn test_render_info_page() {
        let mut state = UIState::new(ServerInfo::default());
        state.show_page(Page::Info);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render_ui(f, &state)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("878365469"));
        assert!(text.contains("TeamSpeak address"));
    }

    #[test]
    fn test_render_popup_over_route_page() {
        let mut state = UIState::new(ServerInfo::default());
        state.show_page(Page::Route);
        state.show_popup(PopupKind::Error, "Error", "HTTP error: 502 Bad Gateway");
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render_ui(f, &state)).unwrap();

        assert!(buffer_text(&terminal).contains("502 Bad Gateway"));
    }
}

//! The AI chat side panel.
//!
//! Wraps a [`ChatPanelController`] with the channels its background jobs
//! report on, and paints it with egui.

use crate::simple_md;
use crate::state::{spawn_load, spawn_send, LoadResult, SendResult};
use chat_host::controller::{EMPTY_STATE_PROMPT, PRIVACY_NOTICE};
use chat_host::{ChatPanelController, LoadPlan, PanelView};
use eframe::egui;
use providers::ChatCompletion;
use services::{ChatRecordStore, ChatRecorder};
use shared::chat::{ChatMessage, ChatRole, ConversationKey};
use shared::settings::DataSavingPreference;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

/// Everything the host page feeds the panel each frame.
#[derive(Debug, Clone, Default)]
pub struct ChatInputs {
    pub identity: ConversationKey,
    pub journal_content: String,
    pub data_saving: DataSavingPreference,
    pub research_consent: bool,
    pub clear_chat: bool,
}

pub struct ChatPanel {
    controller: ChatPanelController,
    records: Arc<dyn ChatRecordStore>,
    recorder: ChatRecorder,
    endpoint: Arc<dyn ChatCompletion>,
    load_tx: Sender<LoadResult>,
    load_rx: Receiver<LoadResult>,
    send_tx: Sender<SendResult>,
    send_rx: Receiver<SendResult>,
    pending_loads: usize,
}

impl ChatPanel {
    pub fn new(
        controller: ChatPanelController,
        records: Arc<dyn ChatRecordStore>,
        endpoint: Arc<dyn ChatCompletion>,
    ) -> Self {
        let (load_tx, load_rx) = channel();
        let (send_tx, send_rx) = channel();
        Self {
            controller,
            recorder: ChatRecorder::new(records.clone()),
            records,
            endpoint,
            load_tx,
            load_rx,
            send_tx,
            send_rx,
            pending_loads: 0,
        }
    }

    pub fn controller(&self) -> &ChatPanelController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ChatPanelController {
        &mut self.controller
    }

    /// Waiting on a history fetch or a reply.
    pub fn is_busy(&self) -> bool {
        self.pending_loads > 0 || self.controller.is_sending()
    }

    /// Push the host's current inputs into the controller, starting a load
    /// when the conversation identity changed.
    pub fn sync(&mut self, ctx: &egui::Context, inputs: &ChatInputs) {
        self.controller.set_journal_content(&inputs.journal_content);
        self.controller.set_data_saving(inputs.data_saving);
        self.controller.set_research_consent(inputs.research_consent);
        self.controller.set_clear_signal(inputs.clear_chat);

        if let Some(LoadPlan::Fetch(request)) = self.controller.set_identity(inputs.identity.clone())
        {
            self.pending_loads += 1;
            spawn_load(
                self.records.clone(),
                request,
                self.load_tx.clone(),
                ctx.clone(),
            );
        }
    }

    /// Drain finished background work (called each frame).
    pub fn poll(&mut self) {
        while let Ok(result) = self.load_rx.try_recv() {
            self.pending_loads = self.pending_loads.saturating_sub(1);
            if !result.request.matches(self.controller.identity()) {
                tracing::debug!(
                    entry = %result.request.entry_id,
                    "chat history arrived after the conversation changed"
                );
            }
            self.controller.finish_load(result.messages);
        }
        while let Ok(result) = self.send_rx.try_recv() {
            self.controller.finish_send(result);
        }
    }

    pub fn submit(&mut self, ctx: &egui::Context) {
        if let Some(job) = self.controller.begin_send() {
            spawn_send(
                job,
                self.endpoint.clone(),
                self.recorder.clone(),
                self.send_tx.clone(),
                ctx.clone(),
            );
        }
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        let dark = ctx.style().visuals.dark_mode;
        let open = self.controller.is_open();

        egui::SidePanel::right("ai_chat_panel")
            .resizable(open)
            .default_width(380.0)
            .show(ctx, |ui| {
                self.show_header(ui);
                if !self.controller.is_open() {
                    return;
                }
                ui.separator();

                egui::TopBottomPanel::bottom("ai_chat_input")
                    .show_separator_line(true)
                    .show_inside(ui, |ui| {
                        ui.add_space(6.0);
                        self.show_input(ui);
                        ui.add_space(6.0);
                    });

                self.show_body(ui, dark);
            });
    }

    fn show_header(&mut self, ui: &mut egui::Ui) {
        let arrow = if self.controller.is_open() { "▾" } else { "▸" };
        let label = egui::RichText::new(format!("{} AI Journal Assistant", arrow))
            .strong()
            .size(15.0);
        if ui.add(egui::Button::new(label).frame(false)).clicked() {
            self.controller.toggle_open();
        }
    }

    fn show_body(&mut self, ui: &mut egui::Ui, dark: bool) {
        match self.controller.view() {
            PanelView::Loading => {
                ui.vertical_centered(|ui| {
                    ui.add_space(24.0);
                    ui.spinner();
                    ui.label(egui::RichText::new("Loading conversation...").weak());
                });
            }
            PanelView::Empty => {
                ui.add_space(16.0);
                ui.label(egui::RichText::new(EMPTY_STATE_PROMPT).size(14.0));
                ui.add_space(12.0);
                ui.label(egui::RichText::new(PRIVACY_NOTICE).size(11.0).weak());
            }
            PanelView::Conversation { sending } => {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for msg in self.controller.messages() {
                            ui.add_space(6.0);
                            render_message(ui, msg, dark);
                        }
                        if sending {
                            ui.add_space(6.0);
                            render_thinking(ui, dark);
                        }
                    });
            }
        }
    }

    fn show_input(&mut self, ui: &mut egui::Ui) {
        let mut submit = false;
        ui.horizontal(|ui| {
            let edit = egui::TextEdit::multiline(self.controller.input_mut())
                .hint_text("Ask about your entry...")
                .desired_rows(2)
                .desired_width(ui.available_width() - 64.0);
            let response = ui.add(edit);
            if response.has_focus()
                && ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift)
            {
                submit = true;
            }

            let can_send =
                !self.controller.is_sending() && !self.controller.input().trim().is_empty();
            if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                submit = true;
            }
        });

        if submit {
            self.submit(ui.ctx());
        }
    }
}

fn render_message(ui: &mut egui::Ui, msg: &ChatMessage, dark: bool) {
    let is_user = msg.role == ChatRole::User;
    let (fill, text_color) = match (is_user, dark) {
        (true, _) => (
            egui::Color32::from_rgb(70, 110, 170),
            egui::Color32::WHITE,
        ),
        (false, true) => (
            egui::Color32::from_rgb(50, 50, 58),
            egui::Color32::from_rgb(225, 225, 230),
        ),
        (false, false) => (
            egui::Color32::from_rgb(236, 236, 240),
            egui::Color32::from_rgb(40, 40, 48),
        ),
    };
    let layout = if is_user {
        egui::Layout::right_to_left(egui::Align::TOP)
    } else {
        egui::Layout::left_to_right(egui::Align::TOP)
    };

    ui.with_layout(layout, |ui| {
        egui::Frame::none()
            .fill(fill)
            .rounding(egui::Rounding::same(12.0))
            .inner_margin(egui::Margin::same(10.0))
            .show(ui, |ui| {
                ui.set_max_width(ui.available_width() * 0.85);
                if is_user {
                    // Preformatted: keep the user's line breaks and spacing
                    ui.add(
                        egui::Label::new(
                            egui::RichText::new(&msg.content)
                                .monospace()
                                .color(text_color),
                        )
                        .wrap(true),
                    );
                } else {
                    simple_md::render_markdown(ui, &msg.content, text_color);
                }
            });
    });
}

fn render_thinking(ui: &mut egui::Ui, dark: bool) {
    egui::Frame::none()
        .fill(if dark {
            egui::Color32::from_rgb(50, 50, 58)
        } else {
            egui::Color32::from_rgb(230, 230, 235)
        })
        .rounding(egui::Rounding::same(12.0))
        .inner_margin(egui::Margin::same(12.0))
        .show(ui, |ui| {
            let time = ui.input(|i| i.time);
            let dots = match ((time * 2.0) as i32) % 4 {
                0 => "   ",
                1 => ".  ",
                2 => ".. ",
                _ => "...",
            };
            ui.label(
                egui::RichText::new(format!("Thinking{}", dots))
                    .color(if dark {
                        egui::Color32::from_rgb(160, 160, 180)
                    } else {
                        egui::Color32::from_rgb(60, 60, 70)
                    })
                    .italics(),
            );
        });
    ui.ctx().request_repaint();
}

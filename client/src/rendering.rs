use crate::animation::clip_for;
use crate::game::{ClientGameState, ConnectionStatus};
use crate::mirror::MirrorEntry;
use macroquad::prelude::*;
use shared::ParticipantId;

/// Screen pixels per world unit.
pub const PIXELS_PER_UNIT: f32 = 100.0;
pub const PARTICIPANT_SIZE: f32 = 40.0;

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    fn floor_y(&self) -> f32 {
        self.height * 0.75
    }

    /// World x/y to the top-left corner of a participant's box. World y grows
    /// upward, screen y downward.
    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.width / 2.0 + x * PIXELS_PER_UNIT - PARTICIPANT_SIZE / 2.0,
            self.floor_y() - y * PIXELS_PER_UNIT - PARTICIPANT_SIZE,
        )
    }

    pub fn render(&mut self, state: &ClientGameState) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_floor();

        let local = state.identity();
        for entry in state.mirror.entries() {
            let is_local = Some(entry.state.identity) == local;
            let color = if is_local {
                GREEN
            } else {
                Color::from_rgba(255, 68, 68, 255)
            };
            self.draw_participant(entry, color);
        }

        self.draw_ui(state);
    }

    fn draw_floor(&mut self) {
        let floor_y = self.floor_y();
        draw_rectangle(
            0.0,
            floor_y,
            self.width,
            self.height - floor_y,
            Color::from_rgba(68, 68, 68, 255),
        );
    }

    fn draw_participant(&mut self, entry: &MirrorEntry, color: Color) {
        let (x, y) = self.to_screen(entry.displayed.x, entry.displayed.y);
        draw_rectangle(x, y, PARTICIPANT_SIZE, PARTICIPANT_SIZE, color);
        draw_rectangle_lines(x, y, PARTICIPANT_SIZE, PARTICIPANT_SIZE, 2.0, WHITE);

        draw_rectangle(
            x + PARTICIPANT_SIZE / 2.0 - 2.0,
            y - 8.0,
            4.0,
            4.0,
            id_color(entry.state.identity),
        );
        draw_text(&entry.state.display_name, x, y - 12.0, 14.0, WHITE);
        draw_text(
            clip_for(entry.state.action_state),
            x,
            y + PARTICIPANT_SIZE + 14.0,
            12.0,
            LIGHTGRAY,
        );
    }

    fn draw_ui(&mut self, state: &ClientGameState) {
        let y_start = 10.0;

        let (connection_color, label) = match &state.status {
            ConnectionStatus::Connecting => (YELLOW, "connecting".to_string()),
            ConnectionStatus::Joined(identity) => (GREEN, format!("player {}", identity)),
            ConnectionStatus::Rejected(reason) => (RED, format!("rejected: {}", reason)),
            ConnectionStatus::Disconnected(reason) => (RED, format!("disconnected: {}", reason)),
        };
        draw_rectangle(10.0, y_start, 8.0, 8.0, connection_color);
        draw_text(&label, 24.0, y_start + 8.0, 14.0, WHITE);

        let player_y = y_start + 18.0;
        let count = state.mirror.len();
        for i in 0..count.min(8) {
            draw_rectangle(
                10.0 + (i as f32) * 4.0,
                player_y,
                3.0,
                3.0,
                Color::from_rgba(0, 170, 255, 255),
            );
        }
        draw_text(&format!("{} players", count), 45.0, player_y + 3.0, 12.0, WHITE);

        if let Some(tick) = state.mirror.last_tick() {
            draw_text(&format!("tick {}", tick), 10.0, player_y + 18.0, 12.0, GRAY);
        }

        draw_text(
            "Arrows: move/jump  Space: low attack  X: high attack",
            10.0,
            self.height - 10.0,
            14.0,
            GRAY,
        );
    }
}

fn id_color(identity: ParticipantId) -> Color {
    match identity % 8 {
        0 => WHITE,
        1 => RED,
        2 => GREEN,
        3 => BLUE,
        4 => YELLOW,
        5 => MAGENTA,
        6 => Color::from_rgba(0, 255, 255, 255),
        _ => Color::from_rgba(136, 136, 136, 255),
    }
}

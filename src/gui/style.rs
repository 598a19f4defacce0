use iced::{Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

/// Candidate rows: a button that looks like a plain list entry.
pub struct CandidateRowStyleSheet;

impl StyleSheet for CandidateRowStyleSheet {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            shadow_offset: Default::default(),
            background: None,
            text_color: Color::BLACK,
            border: Border {
                color: Color::from_rgb8(0xDD, 0xDD, 0xDD),
                width: 1.0,
                radius: 4.0.into(),
            },
            shadow: Shadow::default(),
        }
    }

    fn hovered(&self, style: &Self::Style) -> Appearance {
        Appearance {
            background: Some(Color::from_rgb8(0xF0, 0xF4, 0xFA).into()),
            ..self.active(style)
        }
    }
}

use iced::Event;
use iced::window;

use crate::discovery::types::DiscoveryEvent;

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    Discovery(DiscoveryEvent),
    StartStopPressed,
    CandidatePressed(usize),
    NoticeConfirmed,
    BackToDiscovery,
    ScreenSaved(window::Id),
}

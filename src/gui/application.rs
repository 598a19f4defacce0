use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use futures::channel::mpsc::{channel, Receiver};
use futures::future::pending;
use futures::{SinkExt, StreamExt};
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, window};
use iced::event::{self, Event};
use iced::subscription::{self, Subscription};
use iced::theme::{self, Theme};
use iced::widget::{Column, button, column, container, horizontal_rule, row, scrollable, text};
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::config::io::{load_startup_state, ConfigIO, ScreenIO};
use crate::config::types::Config;
use crate::device::support::KnownDevices;
use crate::discovery::constants::EVENT_CHANNEL_SIZE;
use crate::discovery::controller::{DiscoveryController, ScanSettings};
use crate::discovery::types::{DeviceCandidate, DiscoveryEvent, PairingRequest, SavedScreen};
use crate::error::AppRunError;
use crate::gui::host::ScreenHost;
use crate::gui::style::CandidateRowStyleSheet;
use crate::gui::types::Message;
use crate::platform::btle::{btle_platform, BtlePlatform};

/// Receiving end of the controller's event channel, handed once to the subscription.
#[derive(Clone)]
struct EventInbox {
    receiver: Arc<Mutex<Option<Receiver<DiscoveryEvent>>>>,
}

impl EventInbox {
    fn new(receiver: Receiver<DiscoveryEvent>) -> Self {
        EventInbox { receiver: Arc::new(Mutex::new(Some(receiver))) }
    }

    fn take(&self) -> Option<Receiver<DiscoveryEvent>> {
        self.receiver.lock().expect("Failed to lock EventInbox").take()
    }
}

fn discovery_event_subscription(inbox: EventInbox) -> Subscription<DiscoveryEvent> {
    struct Inbox;

    subscription::channel(
        std::any::TypeId::of::<Inbox>(),
        EVENT_CHANNEL_SIZE,
        move |mut output| async move {
            if let Some(mut receiver) = inbox.take() {
                while let Some(event) = receiver.next().await {
                    if output.send(event).await.is_err() {
                        break;
                    }
                }
            }

            // note: subscription::channel expects the future to never resolve
            pending::<Infallible>().await
        },
    )
}

enum Screen {
    Discovery,
    Pairing(PairingRequest),
}

pub struct ApplicationFlags {
    config: Config,
    saved: Option<SavedScreen>,
    error_message: Option<String>,
    screen_io: ScreenIO,
}

pub struct DiscoveryApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,
    screen_io: ScreenIO,
    controller: DiscoveryController<BtlePlatform, ScreenHost>,
    inbox: EventInbox,
    screen: Screen,
    // set by the adapter report that answers the registration
    adapter_reported: bool,
}

impl DiscoveryApplication {
    fn before_close(&mut self, id: window::Id) -> Command<Message> {
        let saved = self.controller.exit();
        let screen_io = self.screen_io.clone();

        let fut = async move {
            if let Err(err) = screen_io.save(&saved).await {
                error!("Failed to save discovery screen: {:?}", &err);
            }
        };

        Command::perform(fut, move |_| Message::ScreenSaved(id))
    }

    fn discovery_view(&self) -> Element<Message> {
        let snapshot = &self.controller.host().snapshot;

        let progress = if snapshot.progress_visible() {
            format!("{}…", snapshot.scan)
        } else {
            "".to_string()
        };

        let mut start_button = button(text(snapshot.start_label()))
            .style(theme::Button::Primary);
        if snapshot.start_enabled && self.adapter_reported {
            start_button = start_button.on_press(Message::StartStopPressed);
        }

        let candidate_row = |index: usize, candidate: &DeviceCandidate| -> Element<Message> {
            button(
                row![
                    column![
                        text(candidate.display_name()),
                        text(&candidate.address).size(12),
                    ].width(Length::Fill),
                    text(format!("{} dBm", candidate.rssi)).size(12),
                ]
                    .align_items(Alignment::Center)
                    .spacing(10)
            )
                .width(Length::Fill)
                .padding(10)
                .style(theme::Button::Custom(Box::new(CandidateRowStyleSheet)))
                .on_press(Message::CandidatePressed(index))
                .into()
        };

        let list: Element<Message> = if snapshot.candidates.is_empty() {
            text("No supported devices found yet").size(14).into()
        } else {
            scrollable(
                Column::with_children(
                    snapshot.candidates
                        .iter()
                        .enumerate()
                        .map(|(index, candidate)| candidate_row(index, candidate))
                )
                    .spacing(8)
                    .width(Length::Fill)
            )
                .height(Length::Fill)
                .into()
        };

        container(
            column![
                row![
                    text(progress).width(Length::Fill),
                    start_button,
                ].align_items(Alignment::Center),

                horizontal_rule(10),

                list,
            ]
                .spacing(20)
                .width(Length::Fill)
                .height(Length::Fill),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }

    fn pairing_view(&self, request: &PairingRequest) -> Element<Message> {
        container(
            column![
                text(format!("Pair {}", request.family)).size(24),
                text(format!("Device {}", request.address)),
                text(format!("Pairing entry point: {}", request.pairing_entry)).size(14),

                button(text("Back"))
                    .style(theme::Button::Secondary)
                    .on_press(Message::BackToDiscovery),
            ].align_items(Alignment::Center).spacing(20),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }
}

impl Application for DiscoveryApplication {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (DiscoveryApplication, Command<Self::Message>) {
        let app_cancel = CancellationToken::new();
        let config = flags.config;

        let (events_sender, events_receiver) = channel::<DiscoveryEvent>(EVENT_CHANNEL_SIZE);
        // the worker stops when app_cancel is cancelled
        let (platform, _) = btle_platform(
            app_cancel.clone(),
            events_sender.clone(),
            config.classic_inquiry_window(),
        );

        let mut host = ScreenHost::default();
        if let Some(error_message) = flags.error_message {
            host.notices.push(error_message);
        }

        let settings = ScanSettings {
            scan_duration: config.scan_duration(),
            low_energy: config.low_energy,
        };
        let mut controller = DiscoveryController::new(
            platform,
            host,
            Box::new(KnownDevices::new(config.devices)),
            settings,
            events_sender,
        );
        controller.enter(flags.saved);

        let app = DiscoveryApplication {
            app_cancel,
            screen_io: flags.screen_io,
            controller,
            inbox: EventInbox::new(events_receiver),
            screen: Screen::Discovery,
            adapter_reported: false,
        };

        (app, Command::none())
    }

    fn title(&self) -> String {
        String::from(concat!("Device Discovery ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::Discovery(event) => {
                if let DiscoveryEvent::AdapterStateChanged { .. } = event {
                    self.adapter_reported = true;
                }
                self.controller.handle(event);
            },
            Message::StartStopPressed if !self.adapter_reported => {
                debug!("Start button clicked before the adapter was probed");
            },
            Message::StartStopPressed => {
                self.controller.toggle_discovery();
            },
            Message::CandidatePressed(index) => {
                if let Err(err) = self.controller.select(index) {
                    debug!("Selection ignored: {}", err);
                }
            },
            Message::NoticeConfirmed => {
                let notices = &mut self.controller.host_mut().notices;
                if !notices.is_empty() {
                    notices.remove(0);
                }
            },
            Message::BackToDiscovery => {
                self.screen = Screen::Discovery;
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                return self.before_close(id);
            },
            Message::ScreenSaved(id) => {
                self.app_cancel.cancel();
                return window::close(id);
            },
            Message::EventOccurred(_) => {},
        }

        if let Some(request) = self.controller.host_mut().pairing.take() {
            self.screen = Screen::Pairing(request);
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            event::listen().map(Message::EventOccurred),
            discovery_event_subscription(self.inbox.clone()).map(Message::Discovery),
        ])
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.controller.host().notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        match &self.screen {
            Screen::Discovery => self.discovery_view(),
            Screen::Pairing(request) => self.pairing_view(request),
        }
    }
}

pub fn run_application(args: Args) -> Result<(), AppRunError> {
    let mut config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;
    let screen_io = ScreenIO::new()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let startup = runtime.block_on(load_startup_state(&config_io, &screen_io, !args.fresh));
    drop(runtime);

    let flags = ApplicationFlags {
        config: args.apply(startup.config),
        saved: startup.saved,
        error_message: startup.error_message,
        screen_io,
    };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("device-discovery".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(480.0, 640.0);

    // this function will call process::exit() unless there was a startup error
    DiscoveryApplication::run(settings)?;
    Ok(())
}

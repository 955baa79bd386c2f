//! Log consumers for attached container output.
//!
//! The engine pushes container output through the four-callback
//! `LogConsumer` contract. Two variants exist: a silent one for detached
//! runs and a colorized multiplexing one for attached runs, selected by
//! configuration. The multiplexing consumer is constructed once per `up`
//! invocation and owns its state explicitly; nothing here is a global.

use colored::{Color, Colorize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Consumer of per-service log, error and status lines.
///
/// `register` may be called lazily on the first line from a service, and
/// callbacks arrive concurrently from one stream task per container.
pub trait LogConsumer: Send + Sync {
    /// A new container/service stream appeared.
    fn register(&self, service: &str);

    /// A stdout line from the service.
    fn log(&self, service: &str, message: &str);

    /// A stderr line from the service.
    fn err(&self, service: &str, message: &str);

    /// A lifecycle status line for the service (created, started, ...).
    fn status(&self, service: &str, message: &str);
}

/// Consumer that drops everything, used for detached runs.
pub struct SilentLogConsumer;

impl LogConsumer for SilentLogConsumer {
    fn register(&self, _service: &str) {}
    fn log(&self, _service: &str, _message: &str) {}
    fn err(&self, _service: &str, _message: &str) {}
    fn status(&self, _service: &str, _message: &str) {}
}

/// Round-robin color palette for service prefixes.
const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];

struct Presenter {
    color: Color,
    prefix: String,
}

struct ConsumerState {
    presenters: HashMap<String, Presenter>,
    /// Shared left-column width across all registered services.
    width: usize,
    /// Round-robin cursor into the palette.
    next_color: usize,
}

impl ConsumerState {
    fn register(&mut self, service: &str) -> &Presenter {
        if !self.presenters.contains_key(service) {
            let color = PALETTE[self.next_color % PALETTE.len()];
            self.next_color += 1;
            self.presenters.insert(
                service.to_string(),
                Presenter { color, prefix: String::new() },
            );
            self.recompute_prefixes();
        }
        &self.presenters[service]
    }

    /// Recompute the shared column width and rebuild every prefix so all
    /// lines stay aligned after a new service registers.
    fn recompute_prefixes(&mut self) {
        let width = self
            .presenters
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            + 1;
        self.width = width;
        for (name, presenter) in &mut self.presenters {
            presenter.prefix = format!("{:<width$}| ", name)
                .color(presenter.color)
                .to_string();
        }
    }
}

/// Colorized, width-aligned multiplexer for attached runs.
pub struct MultiplexedLogConsumer {
    state: Mutex<ConsumerState>,
}

impl Default for MultiplexedLogConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplexedLogConsumer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConsumerState {
                presenters: HashMap::new(),
                width: 0,
                next_color: 0,
            }),
        }
    }

    fn prefix_for(&self, service: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.register(service).prefix.clone()
    }

    fn color_for(&self, service: &str) -> Color {
        let mut state = self.state.lock().unwrap();
        state.register(service).color
    }
}

impl LogConsumer for MultiplexedLogConsumer {
    fn register(&self, service: &str) {
        let mut state = self.state.lock().unwrap();
        state.register(service);
    }

    fn log(&self, service: &str, message: &str) {
        let prefix = self.prefix_for(service);
        for line in message.lines() {
            println!("{}{}", prefix, line);
        }
    }

    fn err(&self, service: &str, message: &str) {
        let prefix = self.prefix_for(service);
        for line in message.lines() {
            eprintln!("{}{}", prefix, line);
        }
    }

    fn status(&self, service: &str, message: &str) {
        let color = self.color_for(service);
        println!("{}", format!("{} {}", service, message).color(color));
    }
}

//! Threaded execution actor.
//!
//! The actor thread owns the [`Scheduler`] (and with it the CPU, the only
//! writer of the shared memory region). Hosts talk to it through a
//! [`SchedulerHandle`] over two bounded channels. While stopped the thread
//! blocks on the command channel; while running it wakes every
//! `tick_interval` to catch the CPU up with wall-clock time.

use super::{Command, ConfigError, Event, ProtocolError, RunState, Scheduler, SchedulerConfig};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why the actor could not be started
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start scheduler thread: {0}")]
    Thread(#[from] io::Error),
}

/// Owner-side handle to a scheduler running on its own thread.
///
/// Dropping the handle shuts the actor down and joins its thread.
///
/// # Examples
///
/// ```
/// use vconsole::{Command, Event, SchedulerConfig, SchedulerHandle, SharedMemory};
///
/// let memory = SharedMemory::new();
/// let handle = SchedulerHandle::spawn(SchedulerConfig::default()).unwrap();
/// handle.send(Command::Init(memory.clone())).unwrap();
/// assert_eq!(handle.recv().unwrap(), Event::Initialized);
///
/// handle.send(Command::Step).unwrap();
/// let Event::Stepped(snapshot) = handle.recv().unwrap() else { panic!() };
/// assert_eq!(snapshot.program_counter, 1);
/// ```
pub struct SchedulerHandle {
    commands: SyncSender<Command>,
    events: Receiver<Event>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Starts the actor thread.
    ///
    /// # Errors
    ///
    /// [`SpawnError::Config`] if `config` fails
    /// [`SchedulerConfig::validate`], or [`SpawnError::Thread`] if the OS
    /// refuses the thread.
    pub fn spawn(config: SchedulerConfig) -> Result<Self, SpawnError> {
        config.validate()?;
        let (command_tx, command_rx) = mpsc::sync_channel(config.command_capacity);
        let (event_tx, event_rx) = mpsc::sync_channel(config.event_capacity);
        let thread = thread::Builder::new()
            .name("vconsole-scheduler".into())
            .spawn(move || run_actor(Scheduler::new(config), command_rx, event_tx))?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    /// Queues a command, blocking if the command channel is full.
    pub fn send(&self, command: Command) -> Result<(), ProtocolError> {
        self.commands
            .send(command)
            .map_err(|_| ProtocolError::Disconnected)
    }

    /// Waits for the next event.
    pub fn recv(&self) -> Result<Event, ProtocolError> {
        self.events.recv().map_err(|_| ProtocolError::Disconnected)
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Event>, ProtocolError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ProtocolError::Disconnected),
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&self) -> Option<Event> {
        self.events.try_recv().ok()
    }

    /// Stops the actor and waits for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop_actor();
    }

    fn stop_actor(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let mut shutdown = Some(Command::Shutdown);
        // The actor may be blocked on a full event channel, so keep draining
        // events until it sees the shutdown command.
        while !thread.is_finished() {
            if let Some(command) = shutdown.take() {
                match self.commands.try_send(command) {
                    Err(TrySendError::Full(command)) => shutdown = Some(command),
                    Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                }
            }
            while self.events.try_recv().is_ok() {}
            thread::sleep(Duration::from_millis(1));
        }
        if thread.join().is_err() {
            log::error!("scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop_actor();
    }
}

fn run_actor(mut scheduler: Scheduler, commands: Receiver<Command>, events: SyncSender<Event>) {
    let interval = scheduler.config().tick_interval;
    let mut last_tick = Instant::now();
    log::debug!("scheduler actor started");

    loop {
        let command = if scheduler.state() == RunState::Stopped {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        } else {
            match commands.recv_timeout(interval) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        };

        if let Some(command) = command {
            if matches!(command, Command::Shutdown) {
                break;
            }
            let was_running = scheduler.state() == RunState::Running;
            let name = command.name();
            match scheduler.handle(command) {
                Ok(Some(event)) => {
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => log::warn!("ignoring {name}: {err}"),
            }
            if !was_running {
                last_tick = Instant::now();
            }
        }

        if scheduler.state() == RunState::Running {
            let now = Instant::now();
            let elapsed = now.duration_since(last_tick);
            last_tick = now;
            if let Some(event) = scheduler.tick(elapsed) {
                if events.send(event).is_err() {
                    break;
                }
            }
        }
    }
    log::debug!("scheduler actor stopped");
}

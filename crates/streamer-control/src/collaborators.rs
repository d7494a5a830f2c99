//! Interfaces to the external stores `CommandHandlers` calls through:
//! services, outputs, PID/section filters, the front-end, and the quote
//! channel's command interpreter. §1 lists these as out-of-scope
//! collaborators — only the shapes the handlers need are specified here.

/// Why a collaborator call failed, mapped directly onto the `RERR` error
/// code registry (§6) by the handler that catches it.
#[derive(Debug, Clone)]
pub enum CollabError {
    NotFound,
    Exists,
    Streaming,
    Generic(String),
}

/// A single configured output (name + destination MRL).
#[derive(Debug, Clone)]
pub struct OutputInfo {
    pub name: String,
    pub mrl: String,
}

/// A single configured section filter (name, destination MRL, service it
/// filters).
#[derive(Debug, Clone)]
pub struct FilterInfo {
    pub name: String,
    pub mrl: String,
    pub service: String,
}

/// Front-end tuner status: lock state, bit error rate, signal strength and
/// quality (arbitrary units, passed through from the tuner driver).
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontendStatus {
    pub locked: bool,
    pub bit_error_rate: u32,
    pub signal_strength: u16,
    pub signal_quality: u16,
}

/// Transport-stream statistics: 5 running counters surfaced verbatim as
/// `RTSS`'s payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsStats {
    pub packets_received: u32,
    pub tei_errors: u32,
    pub continuity_errors: u32,
    pub scrambled_packets: u32,
    pub demux_errors: u32,
}

/// A sink the quote channel's command interpreter writes formatted text
/// into. §9 "Quote channel print sink": the original redirects a process-
/// wide `printf`; this is the sink-interface replacement the design note
/// calls for.
pub trait QuoteSink {
    fn write_str(&mut self, s: &str);
}

/// Everything `CommandHandlers` needs from the service/output/tuner layer.
/// A real daemon implements this against its service store, output store
/// and tuner front-end; tests implement it against an in-memory fake.
pub trait Collaborators: Send + Sync {
    fn service_select_primary(&self, name: &str) -> Result<(), CollabError>;
    fn service_primary_current(&self) -> Option<String>;
    fn service_add_secondary(&self, name: &str, mrl: &str) -> Result<(), CollabError>;
    fn service_set_secondary(&self, output: &str, service: &str) -> Result<(), CollabError>;
    fn service_remove_secondary(&self, name: &str) -> Result<(), CollabError>;
    fn service_set_destination(&self, name: &str, mrl: &str) -> Result<(), CollabError>;

    fn output_add(&self, name: &str, mrl: &str) -> Result<(), CollabError>;
    fn output_remove(&self, name: &str) -> Result<(), CollabError>;
    fn output_pid_add(&self, name: &str, pids: &[u16]) -> Result<(), CollabError>;
    fn output_pid_remove(&self, name: &str, pids: &[u16]) -> Result<(), CollabError>;
    fn output_set_destination(&self, name: &str, mrl: &str) -> Result<(), CollabError>;
    fn output_list(&self) -> Vec<OutputInfo>;
    fn output_list_pids(&self, name: &str) -> Option<Vec<u16>>;
    fn output_packet_count(&self, name: &str) -> Option<u32>;

    fn service_filter_list(&self) -> Vec<FilterInfo>;
    fn service_filter_packet_count(&self, name: &str) -> Option<u32>;
    fn service_list(&self, current_multiplex_only: bool) -> Vec<String>;
    fn service_pids(&self, name: &str) -> Option<Vec<u16>>;

    fn ts_stats(&self) -> TsStats;
    fn frontend_status(&self) -> FrontendStatus;

    /// Runs `command` through the out-of-scope command interpreter,
    /// streaming its textual output into `sink`. Returns `Ok(())` if the
    /// command was recognised, `Err` (with a short reason) for unknown
    /// commands.
    fn run_command(&self, command: &str, sink: &mut dyn QuoteSink) -> Result<(), String>;
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Mutex;

    use super::{CollabError, Collaborators, FilterInfo, FrontendStatus, OutputInfo, QuoteSink, TsStats};

    /// A collaborator stub that finds nothing and accepts nothing. Good
    /// enough for tests that only exercise the slot table or the auth gate
    /// and never expect a real answer back.
    pub(crate) struct NullCollaborators;

    impl Collaborators for NullCollaborators {
        fn service_select_primary(&self, _name: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn service_primary_current(&self) -> Option<String> {
            None
        }
        fn service_add_secondary(&self, _name: &str, _mrl: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn service_set_secondary(&self, _output: &str, _service: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn service_remove_secondary(&self, _name: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn service_set_destination(&self, _name: &str, _mrl: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn output_add(&self, _name: &str, _mrl: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn output_remove(&self, _name: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn output_pid_add(&self, _name: &str, _pids: &[u16]) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn output_pid_remove(&self, _name: &str, _pids: &[u16]) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn output_set_destination(&self, _name: &str, _mrl: &str) -> Result<(), CollabError> {
            Err(CollabError::NotFound)
        }
        fn output_list(&self) -> Vec<OutputInfo> {
            Vec::new()
        }
        fn output_list_pids(&self, _name: &str) -> Option<Vec<u16>> {
            None
        }
        fn output_packet_count(&self, _name: &str) -> Option<u32> {
            None
        }
        fn service_filter_list(&self) -> Vec<FilterInfo> {
            Vec::new()
        }
        fn service_filter_packet_count(&self, _name: &str) -> Option<u32> {
            None
        }
        fn service_list(&self, _current_multiplex_only: bool) -> Vec<String> {
            Vec::new()
        }
        fn service_pids(&self, _name: &str) -> Option<Vec<u16>> {
            None
        }
        fn ts_stats(&self) -> TsStats {
            TsStats::default()
        }
        fn frontend_status(&self) -> FrontendStatus {
            FrontendStatus::default()
        }
        fn run_command(&self, _command: &str, _sink: &mut dyn QuoteSink) -> Result<(), String> {
            Err("Unknown command".into())
        }
    }

    /// A collaborator backed by in-memory state, for tests that need real
    /// round-trip behaviour (add a service, then list it back).
    pub(crate) struct FakeCollaborators {
        pub services: Mutex<Vec<String>>,
        pub outputs: Mutex<Vec<OutputInfo>>,
        pub primary: Mutex<Option<String>>,
    }

    impl FakeCollaborators {
        pub(crate) fn new() -> Self {
            Self {
                services: Mutex::new(vec!["BBC ONE".into(), "BBC TWO".into()]),
                outputs: Mutex::new(Vec::new()),
                primary: Mutex::new(None),
            }
        }
    }

    impl Collaborators for FakeCollaborators {
        fn service_select_primary(&self, name: &str) -> Result<(), CollabError> {
            if self.services.lock().unwrap().iter().any(|s| s == name) {
                *self.primary.lock().unwrap() = Some(name.to_string());
                Ok(())
            } else {
                Err(CollabError::NotFound)
            }
        }
        fn service_primary_current(&self) -> Option<String> {
            self.primary.lock().unwrap().clone()
        }
        fn service_add_secondary(&self, _name: &str, _mrl: &str) -> Result<(), CollabError> {
            Ok(())
        }
        fn service_set_secondary(&self, _output: &str, _service: &str) -> Result<(), CollabError> {
            Ok(())
        }
        fn service_remove_secondary(&self, _name: &str) -> Result<(), CollabError> {
            Ok(())
        }
        fn service_set_destination(&self, _name: &str, _mrl: &str) -> Result<(), CollabError> {
            Ok(())
        }
        fn output_add(&self, name: &str, mrl: &str) -> Result<(), CollabError> {
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.iter().any(|o| o.name == name) {
                return Err(CollabError::Exists);
            }
            outputs.push(OutputInfo { name: name.to_string(), mrl: mrl.to_string() });
            Ok(())
        }
        fn output_remove(&self, name: &str) -> Result<(), CollabError> {
            let mut outputs = self.outputs.lock().unwrap();
            let before = outputs.len();
            outputs.retain(|o| o.name != name);
            if outputs.len() == before { Err(CollabError::NotFound) } else { Ok(()) }
        }
        fn output_pid_add(&self, name: &str, _pids: &[u16]) -> Result<(), CollabError> {
            if self.outputs.lock().unwrap().iter().any(|o| o.name == name) {
                Ok(())
            } else {
                Err(CollabError::NotFound)
            }
        }
        fn output_pid_remove(&self, name: &str, _pids: &[u16]) -> Result<(), CollabError> {
            if self.outputs.lock().unwrap().iter().any(|o| o.name == name) {
                Ok(())
            } else {
                Err(CollabError::NotFound)
            }
        }
        fn output_set_destination(&self, name: &str, _mrl: &str) -> Result<(), CollabError> {
            if self.outputs.lock().unwrap().iter().any(|o| o.name == name) {
                Ok(())
            } else {
                Err(CollabError::NotFound)
            }
        }
        fn output_list(&self) -> Vec<OutputInfo> {
            self.outputs.lock().unwrap().clone()
        }
        fn output_list_pids(&self, name: &str) -> Option<Vec<u16>> {
            self.outputs.lock().unwrap().iter().any(|o| o.name == name).then(Vec::new)
        }
        fn output_packet_count(&self, name: &str) -> Option<u32> {
            self.outputs.lock().unwrap().iter().any(|o| o.name == name).then_some(0)
        }
        fn service_filter_list(&self) -> Vec<FilterInfo> {
            Vec::new()
        }
        fn service_filter_packet_count(&self, _name: &str) -> Option<u32> {
            None
        }
        fn service_list(&self, _current_multiplex_only: bool) -> Vec<String> {
            self.services.lock().unwrap().clone()
        }
        fn service_pids(&self, name: &str) -> Option<Vec<u16>> {
            self.services.lock().unwrap().iter().any(|s| s == name).then(Vec::new)
        }
        fn ts_stats(&self) -> TsStats {
            TsStats::default()
        }
        fn frontend_status(&self) -> FrontendStatus {
            FrontendStatus::default()
        }
        fn run_command(&self, command: &str, sink: &mut dyn QuoteSink) -> Result<(), String> {
            if command == "ping" {
                sink.write_str("pong");
                Ok(())
            } else {
                Err("Unknown command".into())
            }
        }
    }
}

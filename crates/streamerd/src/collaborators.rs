//! A minimal in-memory `Collaborators` implementation so the daemon is
//! runnable standalone. A real deployment wires `ControlServer` against its
//! own service store, output store and tuner front-end instead (§1 lists
//! these as external collaborators — only their interfaces are specified).

use std::sync::Mutex;

use streamer_control::{
    CollabError, Collaborators, FilterInfo, FrontendStatus, OutputInfo, QuoteSink, TsStats,
};

#[derive(Debug, Clone)]
struct Output {
    mrl: String,
    pids: Vec<u16>,
}

/// Everything lives behind one mutex — this stand-in has no performance
/// requirements, unlike the real tuner/demux layer it stubs out.
#[derive(Default)]
struct Inner {
    services: Vec<String>,
    outputs: Vec<(String, Output)>,
    primary: Option<String>,
}

pub struct StandaloneCollaborators {
    inner: Mutex<Inner>,
}

impl StandaloneCollaborators {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }
}

impl Default for StandaloneCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborators for StandaloneCollaborators {
    fn service_select_primary(&self, name: &str) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        if inner.services.iter().any(|s| s == name) {
            inner.primary = Some(name.to_string());
            Ok(())
        } else {
            Err(CollabError::NotFound)
        }
    }

    fn service_primary_current(&self) -> Option<String> {
        self.inner.lock().expect("collaborator mutex poisoned").primary.clone()
    }

    fn service_add_secondary(&self, name: &str, mrl: &str) -> Result<(), CollabError> {
        self.output_add(name, mrl)
    }

    fn service_set_secondary(&self, output: &str, service: &str) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        if !inner.services.iter().any(|s| s == service) {
            return Err(CollabError::NotFound);
        }
        if inner.outputs.iter().any(|(n, _)| n == output) { Ok(()) } else { Err(CollabError::NotFound) }
    }

    fn service_remove_secondary(&self, name: &str) -> Result<(), CollabError> {
        self.output_remove(name)
    }

    fn service_set_destination(&self, name: &str, mrl: &str) -> Result<(), CollabError> {
        self.output_set_destination(name, mrl)
    }

    fn output_add(&self, name: &str, mrl: &str) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        if inner.outputs.iter().any(|(n, _)| n == name) {
            return Err(CollabError::Exists);
        }
        inner.outputs.push((name.to_string(), Output { mrl: mrl.to_string(), pids: Vec::new() }));
        Ok(())
    }

    fn output_remove(&self, name: &str) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        let before = inner.outputs.len();
        inner.outputs.retain(|(n, _)| n != name);
        if inner.outputs.len() == before { Err(CollabError::NotFound) } else { Ok(()) }
    }

    fn output_pid_add(&self, name: &str, pids: &[u16]) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        let Some((_, output)) = inner.outputs.iter_mut().find(|(n, _)| n == name) else {
            return Err(CollabError::NotFound);
        };
        for &pid in pids {
            if !output.pids.contains(&pid) {
                output.pids.push(pid);
            }
        }
        Ok(())
    }

    fn output_pid_remove(&self, name: &str, pids: &[u16]) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        let Some((_, output)) = inner.outputs.iter_mut().find(|(n, _)| n == name) else {
            return Err(CollabError::NotFound);
        };
        output.pids.retain(|p| !pids.contains(p));
        Ok(())
    }

    fn output_set_destination(&self, name: &str, mrl: &str) -> Result<(), CollabError> {
        let mut inner = self.inner.lock().expect("collaborator mutex poisoned");
        let Some((_, output)) = inner.outputs.iter_mut().find(|(n, _)| n == name) else {
            return Err(CollabError::NotFound);
        };
        output.mrl = mrl.to_string();
        Ok(())
    }

    fn output_list(&self) -> Vec<OutputInfo> {
        self.inner
            .lock()
            .expect("collaborator mutex poisoned")
            .outputs
            .iter()
            .map(|(name, output)| OutputInfo { name: name.clone(), mrl: output.mrl.clone() })
            .collect()
    }

    fn output_list_pids(&self, name: &str) -> Option<Vec<u16>> {
        self.inner
            .lock()
            .expect("collaborator mutex poisoned")
            .outputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, output)| output.pids.clone())
    }

    fn output_packet_count(&self, name: &str) -> Option<u32> {
        self.inner
            .lock()
            .expect("collaborator mutex poisoned")
            .outputs
            .iter()
            .any(|(n, _)| n == name)
            .then_some(0)
    }

    fn service_filter_list(&self) -> Vec<FilterInfo> {
        Vec::new()
    }

    fn service_filter_packet_count(&self, _name: &str) -> Option<u32> {
        None
    }

    fn service_list(&self, _current_multiplex_only: bool) -> Vec<String> {
        self.inner.lock().expect("collaborator mutex poisoned").services.clone()
    }

    fn service_pids(&self, name: &str) -> Option<Vec<u16>> {
        self.inner
            .lock()
            .expect("collaborator mutex poisoned")
            .services
            .iter()
            .any(|s| s == name)
            .then(Vec::new)
    }

    fn ts_stats(&self) -> TsStats {
        TsStats::default()
    }

    fn frontend_status(&self) -> FrontendStatus {
        FrontendStatus::default()
    }

    fn run_command(&self, command: &str, sink: &mut dyn QuoteSink) -> Result<(), String> {
        match command {
            "ping" => {
                sink.write_str("pong");
                Ok(())
            }
            _ => Err("unknown command".into()),
        }
    }
}

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use chorus_core::artifact::Artifact;
use chorus_core::ids::AgentId;

/// Receives structured content found inside a stream. Ownership passes to
/// the sink; sessions keep no copy.
pub trait ArtifactSink: Send + Sync {
    fn emit(&self, agent_id: &AgentId, artifact: Artifact);
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmittedArtifact {
    pub agent_id: AgentId,
    pub artifact: Artifact,
}

/// Logs each artifact and drops it. The orchestrator's default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardArtifacts;

impl ArtifactSink for DiscardArtifacts {
    fn emit(&self, agent_id: &AgentId, artifact: Artifact) {
        debug!(
            agent_id = %agent_id,
            kind = ?artifact.kind,
            bytes = artifact.content.len(),
            "artifact discarded, no sink configured"
        );
    }
}

/// Keeps every artifact in memory, in emission order. Nothing is ever
/// evicted, so it suits tests and short-lived runs.
#[derive(Default)]
pub struct ArtifactCollector {
    items: Mutex<Vec<EmittedArtifact>>,
}

impl ArtifactCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<EmittedArtifact> {
        self.items.lock().clone()
    }

    pub fn for_agent(&self, agent_id: &AgentId) -> Vec<Artifact> {
        self.items
            .lock()
            .iter()
            .filter(|e| &e.agent_id == agent_id)
            .map(|e| e.artifact.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl ArtifactSink for ArtifactCollector {
    fn emit(&self, agent_id: &AgentId, artifact: Artifact) {
        debug!(agent_id = %agent_id, kind = ?artifact.kind, "artifact collected");
        self.items.lock().push(EmittedArtifact {
            agent_id: agent_id.clone(),
            artifact,
        });
    }
}

/// Forwards artifacts to an unbounded channel, e.g. a side panel task.
pub struct ChannelArtifactSink {
    tx: mpsc::UnboundedSender<EmittedArtifact>,
}

impl ChannelArtifactSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EmittedArtifact>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ArtifactSink for ChannelArtifactSink {
    fn emit(&self, agent_id: &AgentId, artifact: Artifact) {
        let item = EmittedArtifact {
            agent_id: agent_id.clone(),
            artifact,
        };
        if self.tx.send(item).is_err() {
            warn!(agent_id = %agent_id, "artifact receiver dropped, artifact discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::artifact::ArtifactKind;

    fn artifact(content: &str) -> Artifact {
        Artifact {
            id: None,
            kind: ArtifactKind::Markdown,
            title: Some("notes".into()),
            language: None,
            content: content.into(),
            metadata: None,
        }
    }

    #[test]
    fn collector_filters_by_agent() {
        let sink = ArtifactCollector::new();
        sink.emit(&AgentId::new("research"), artifact("# a"));
        sink.emit(&AgentId::new("notes"), artifact("# b"));
        sink.emit(&AgentId::new("research"), artifact("# c"));

        assert_eq!(sink.len(), 3);
        let research: Vec<String> = sink
            .for_agent(&AgentId::new("research"))
            .into_iter()
            .map(|a| a.content)
            .collect();
        assert_eq!(research, vec!["# a", "# c"]);
    }

    #[tokio::test]
    async fn channel_sink_forwards() {
        let (sink, mut rx) = ChannelArtifactSink::new();
        sink.emit(&AgentId::new("mindmap"), artifact("{}"));
        let got = rx.recv().await.unwrap();
        assert_eq!(got.agent_id.as_str(), "mindmap");
        assert_eq!(got.artifact.content, "{}");
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelArtifactSink::new();
        drop(rx);
        sink.emit(&AgentId::new("mindmap"), artifact("{}"));
    }
}

// src/config.rs

//! Parses and validates the coordinator's static cluster topology file
//! (spec.md §6). The grammar is plain and line-oriented, not TOML — the
//! spec pins it down exactly — but the loading/validation split follows
//! `Config::from_file` / `Config::validate`'s shape: read the whole file,
//! parse eagerly, then run every structural check in one `validate` pass
//! that returns a descriptive `anyhow!` error.

use anyhow::{Context, Result, anyhow};
use std::fs;

/// One line of the topology file: a server's host and its three listen ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// `localhost`, or `user@host` for a server the coordinator must launch
    /// over a remote shell (spec.md §6). Remote launch itself is out of
    /// scope for this distillation; see `coordinator::launcher`.
    pub host: String,
    pub client_port: u16,
    pub peer_port: u16,
    pub coordinator_port: u16,
}

impl NodeSpec {
    /// The host part a client/peer should dial: `user@host` strips the
    /// `user@` prefix, since that prefix only matters to the coordinator's
    /// own launcher, not to anyone connecting to the server's listen ports.
    pub fn connect_host(&self) -> &str {
        match self.host.split_once('@') {
            Some((_, host)) => host,
            None => &self.host,
        }
    }

    fn validate(&self, line_no: usize) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("line {line_no}: host cannot be empty"));
        }
        if self.host.ends_with('@') || self.host.starts_with('@') {
            return Err(anyhow!("line {line_no}: malformed hostname '{}'", self.host));
        }
        for (name, port) in [
            ("client-port", self.client_port),
            ("peer-port", self.peer_port),
            ("coordinator-port", self.coordinator_port),
        ] {
            if port == 0 {
                return Err(anyhow!("line {line_no}: {name} cannot be 0"));
            }
        }
        Ok(())
    }
}

/// The fully parsed and validated cluster topology: `N` servers and their
/// placement-relevant metadata.
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    pub nodes: Vec<NodeSpec>,
}

impl ClusterTopology {
    pub fn n(&self) -> usize {
        self.nodes.len()
    }

    /// Reads and parses the topology file at `path`, then validates it.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read config file at '{path}'"))?;
        let topology = Self::parse(&contents)
            .with_context(|| format!("failed to parse cluster config from '{path}'"))?;
        topology.validate()?;
        Ok(topology)
    }

    fn parse(contents: &str) -> Result<Self> {
        let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());

        let n_line = lines.next().ok_or_else(|| anyhow!("missing server count line"))?;
        let n: usize = n_line
            .parse()
            .with_context(|| format!("invalid server count '{n_line}'"))?;

        let mut nodes = Vec::with_capacity(n);
        for (i, line) in lines.by_ref().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [host, client_port, peer_port, coordinator_port] = fields.as_slice() else {
                return Err(anyhow!(
                    "line {}: expected '<host> <client-port> <peer-port> <coordinator-port>', got '{line}'",
                    i + 2
                ));
            };
            nodes.push(NodeSpec {
                host: host.to_string(),
                client_port: client_port
                    .parse()
                    .with_context(|| format!("line {}: invalid client-port", i + 2))?,
                peer_port: peer_port
                    .parse()
                    .with_context(|| format!("line {}: invalid peer-port", i + 2))?,
                coordinator_port: coordinator_port
                    .parse()
                    .with_context(|| format!("line {}: invalid coordinator-port", i + 2))?,
            });
        }

        if nodes.len() != n {
            return Err(anyhow!(
                "declared N={n} but found {} server lines",
                nodes.len()
            ));
        }

        Ok(Self { nodes })
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.len() < 3 {
            return Err(anyhow!(
                "N must be at least 3, got {} (spec requires N >= 3; N=2 is explicitly rejected)",
                self.nodes.len()
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            node.validate(i + 2)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> String {
        let mut s = format!("{n}\n");
        for i in 0..n {
            s += &format!("localhost {} {} {}\n", 9000 + i, 9100 + i, 9200 + i);
        }
        s
    }

    #[test]
    fn parses_a_well_formed_topology() {
        let topo = ClusterTopology::parse(&sample(3)).unwrap();
        assert_eq!(topo.n(), 3);
        assert_eq!(topo.nodes[1].client_port, 9001);
    }

    #[test]
    fn rejects_n_equal_two() {
        let err = ClusterTopology::parse(&sample(2)).unwrap().validate();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let bad = "3\nlocalhost 0 9100 9200\nlocalhost 9001 9101 9201\nlocalhost 9002 9102 9202\n";
        let topo = ClusterTopology::parse(bad).unwrap();
        assert!(topo.validate().is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        let bad = "1\nlocalhost 9000 9100\n";
        assert!(ClusterTopology::parse(bad).is_err());
    }

    #[test]
    fn rejects_malformed_n() {
        let bad = "not-a-number\nlocalhost 9000 9100 9200\n";
        assert!(ClusterTopology::parse(bad).is_err());
    }

    #[test]
    fn connect_host_strips_ssh_user() {
        let node = NodeSpec {
            host: "alice@db1.internal".to_string(),
            client_port: 1,
            peer_port: 2,
            coordinator_port: 3,
        };
        assert_eq!(node.connect_host(), "db1.internal");
    }
}

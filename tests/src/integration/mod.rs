//! Multi-guard integration flows.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod bridge_flow;
#[cfg(test)]
mod faults;
#[cfg(test)]
mod handshake;

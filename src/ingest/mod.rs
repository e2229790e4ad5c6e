/// Ingestion from field devices.
///
/// `sensor` turns device CSV lines and JSON envelopes into readings and
/// feeds them to the monitor over a channel. `fixtures` holds the sample
/// payloads the unit tests share.

pub mod sensor;

#[cfg(test)]
pub mod fixtures;

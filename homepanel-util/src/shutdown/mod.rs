/*
 *     Copyright 2025 The Homepanel Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shutdown fans a single stop request out to every long-running task.
#[derive(Debug)]
pub struct Shutdown {
    /// Set once the stop request has been observed by this handle.
    is_shutdown: bool,

    /// Used to send the stop request.
    sender: broadcast::Sender<()>,

    /// Used to receive the stop request.
    receiver: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Creates a new Shutdown.
    pub fn new() -> Shutdown {
        let (sender, receiver) = broadcast::channel(1);
        Self {
            is_shutdown: false,
            sender,
            receiver,
        }
    }

    /// Returns true if the stop request has been received.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Sends the stop request to every handle.
    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }

    /// Waits for the stop request.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        let _ = self.receiver.recv().await;
        self.is_shutdown = true;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Shutdown {
    // A clone subscribes to the same sender, so it sees only requests sent after cloning
    // unless the original was already shut down.
    fn clone(&self) -> Self {
        Self {
            is_shutdown: self.is_shutdown,
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// shutdown_signal resolves when the process receives SIGINT, SIGTERM or SIGQUIT.
pub async fn shutdown_signal() {
    let (mut sigint, mut sigterm, mut sigquit) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) {
        (Ok(sigint), Ok(sigterm), Ok(sigquit)) => (sigint, sigterm, sigquit),
        _ => {
            error!("failed to register signal handlers, only ctrl-c stops the process");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        },
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigquit.recv() => {
            info!("received SIGQUIT, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn trigger_reaches_every_clone() {
        let mut shutdown = Shutdown::new();
        let mut sampler = shutdown.clone();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        shutdown.recv().await;
        sampler.recv().await;
        assert!(shutdown.is_shutdown());
        assert!(sampler.is_shutdown());
    }

    #[tokio::test]
    async fn recv_returns_immediately_after_shutdown() {
        let mut shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.recv().await;

        // A second wait must not block.
        timeout(Duration::from_millis(100), shutdown.recv())
            .await
            .unwrap();

        let clone = shutdown.clone();
        assert!(clone.is_shutdown());
    }

    #[tokio::test]
    async fn recv_blocks_without_trigger() {
        let mut shutdown = Shutdown::new();
        assert!(timeout(Duration::from_millis(20), shutdown.recv())
            .await
            .is_err());
        assert!(!shutdown.is_shutdown());
    }
}

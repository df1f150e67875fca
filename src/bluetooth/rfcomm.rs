// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bluetooth RFCOMM transport over BlueZ.
//!
//! Both directions go through BlueZ profiles so that peers find each other
//! by service UUID (SDP) rather than by a hard-coded RFCOMM channel.

use bluer::rfcomm::{Profile, ProfileHandle, Role as ProfileRole, Stream};
use bluer::{Adapter, Address};
use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::peer::PeerIdentifier;
use super::transport::{Listener, Transport};
use crate::config::BluetoothConfig;
use crate::error::{LinkError, Result};

/// Transport backed by the local Bluetooth adapter.
pub struct RfcommTransport {
    session: bluer::Session,
    adapter: Adapter,
    service_name: String,
}

impl RfcommTransport {
    /// Open a BlueZ session and select the adapter.
    pub async fn new(config: &BluetoothConfig) -> Result<Self> {
        info!("Initializing Bluetooth transport...");

        let session = bluer::Session::new()
            .await
            .map_err(|e| LinkError::TransportUnavailable(format!("BlueZ session: {}", e)))?;
        debug!("BlueZ session created");

        let adapter = match &config.adapter {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| LinkError::TransportUnavailable(format!("no adapter: {}", e)))?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            if !config.auto_power_on {
                return Err(LinkError::TransportUnavailable(format!(
                    "adapter {} is powered off",
                    adapter.name()
                )));
            }
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            session,
            adapter,
            service_name: config.service_name.clone(),
        })
    }

    /// List bonded devices, in the order BlueZ reports them.
    pub async fn paired_devices(&self) -> Result<Vec<PeerIdentifier>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let peer = match device.alias().await {
                    Ok(name) => PeerIdentifier::new(addr).with_name(name),
                    Err(_) => PeerIdentifier::new(addr),
                };
                devices.push(peer);
            }
        }

        Ok(devices)
    }

    /// Look up the display name BlueZ knows for `address`.
    pub async fn resolve(&self, address: Address) -> PeerIdentifier {
        resolve_peer(&self.adapter, address).await
    }

    fn profile(&self, service: Uuid, role: ProfileRole) -> Profile {
        Profile {
            uuid: service,
            name: Some(self.service_name.clone()),
            role: Some(role),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        }
    }
}

async fn resolve_peer(adapter: &Adapter, address: Address) -> PeerIdentifier {
    let alias = match adapter.device(address) {
        Ok(device) => device.alias().await.ok(),
        Err(_) => None,
    };
    match alias {
        Some(name) => PeerIdentifier::new(address).with_name(name),
        None => PeerIdentifier::new(address),
    }
}

fn profile_closed() -> LinkError {
    LinkError::Transport(std::io::Error::new(
        std::io::ErrorKind::ConnectionAborted,
        "profile unregistered",
    ))
}

impl Transport for RfcommTransport {
    type Stream = Stream;
    type Listener = RfcommListener;

    async fn connect(&self, peer: &PeerIdentifier, service: Uuid) -> Result<Stream> {
        let mut handle = self
            .session
            .register_profile(self.profile(service, ProfileRole::Client))
            .await?;
        debug!("Client profile registered for {}", service);

        let device = self.adapter.device(peer.address())?;
        let connect = device.connect_profile(&service);
        tokio::pin!(connect);

        // BlueZ hands the socket over through the profile handle; the
        // connect call itself may finish before or after that.
        let early = tokio::select! {
            request = handle.next() => Some(request),
            result = &mut connect => {
                result?;
                None
            }
        };
        let request = match early {
            Some(request) => request,
            None => handle.next().await,
        };
        let request = request.ok_or_else(profile_closed)?;

        debug!("Profile connection to {}", request.device());
        Ok(request.accept()?)
    }

    async fn listen(&self, service: Uuid) -> Result<RfcommListener> {
        let handle = self
            .session
            .register_profile(self.profile(service, ProfileRole::Server))
            .await?;
        info!("SPP service registered (UUID: {})", service);

        Ok(RfcommListener {
            adapter: self.adapter.clone(),
            handle,
        })
    }
}

/// Registered server profile. Dropping it removes the SDP record.
pub struct RfcommListener {
    adapter: Adapter,
    handle: ProfileHandle,
}

impl Listener for RfcommListener {
    type Stream = Stream;

    async fn accept(&mut self) -> Result<(Stream, PeerIdentifier)> {
        let request = self.handle.next().await.ok_or_else(profile_closed)?;
        let address = request.device();

        let stream = request.accept().map_err(|e| {
            warn!("Failed to accept connection from {}: {}", address, e);
            e
        })?;
        let peer = resolve_peer(&self.adapter, address).await;

        Ok((stream, peer))
    }
}

//! Outbound HTTP delivery to registered listeners.
//!
//! Every dispatch is spawned and forgotten: a slow or unreachable listener
//! never holds up the next bus message.

use crate::clients::ClientRegistry;
use crate::engine::Delivery;
use crate::inventory::DeviceInventory;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Listener ports and request timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port receiving per-device status updates
    #[serde(default = "default_device_port")]
    pub device_port: u16,
    /// Port receiving the device inventory
    #[serde(default = "default_inventory_port")]
    pub inventory_port: u16,
    #[serde(default = "default_device_timeout")]
    pub device_timeout_seconds: u64,
    #[serde(default = "default_inventory_timeout")]
    pub inventory_timeout_seconds: u64,
}

fn default_device_port() -> u16 {
    1905
}

fn default_inventory_port() -> u16 {
    1904
}

fn default_device_timeout() -> u64 {
    10
}

fn default_inventory_timeout() -> u64 {
    15
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            device_port: default_device_port(),
            inventory_port: default_inventory_port(),
            device_timeout_seconds: default_device_timeout(),
            inventory_timeout_seconds: default_inventory_timeout(),
        }
    }
}

/// Fans deliveries out to every registered listener
#[derive(Clone)]
pub struct Dispatcher {
    http: reqwest::Client,
    config: HttpConfig,
    clients: Arc<ClientRegistry>,
}

impl Dispatcher {
    pub fn new(config: HttpConfig, clients: Arc<ClientRegistry>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            config,
            clients,
        })
    }

    /// Send each delivery to every listener in the background.
    pub fn dispatch_deliveries(&self, deliveries: Vec<Delivery>) {
        let addresses = self.clients.addresses();
        if addresses.is_empty() {
            debug!(count = deliveries.len(), "No listeners registered, dropping deliveries");
            return;
        }

        for delivery in deliveries {
            let delivery = Arc::new(delivery);
            for &addr in &addresses {
                let dispatcher = self.clone();
                let delivery = Arc::clone(&delivery);
                tokio::spawn(async move {
                    if let Err(e) = dispatcher.send_device(addr, &delivery).await {
                        error!(addr = %addr, device_key = %delivery.event.device_key, error = %e, "Device delivery failed");
                    }
                });
            }
        }
    }

    /// Send the inventory to every listener in the background.
    pub fn dispatch_inventory(&self, inventory: DeviceInventory) {
        let inventory = Arc::new(inventory);
        for addr in self.clients.addresses() {
            let dispatcher = self.clone();
            let inventory = Arc::clone(&inventory);
            tokio::spawn(async move {
                if let Err(e) = dispatcher.send_inventory(addr, &inventory).await {
                    error!(addr = %addr, error = %e, "Inventory delivery failed");
                }
            });
        }
    }

    /// GET with the delivery flattened into query parameters.
    pub async fn send_device(&self, addr: Ipv4Addr, delivery: &Delivery) -> Result<()> {
        let url = format!("http://{}:{}/", addr, self.config.device_port);
        self.http
            .get(&url)
            .query(&delivery.to_params())
            .timeout(Duration::from_secs(self.config.device_timeout_seconds))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("Listener {} rejected device update", url))?;

        debug!(addr = %addr, device_key = %delivery.event.device_key, "Device update sent");
        Ok(())
    }

    /// GET with the inventory as a JSON body.
    pub async fn send_inventory(&self, addr: Ipv4Addr, inventory: &DeviceInventory) -> Result<()> {
        let url = format!("http://{}:{}/", addr, self.config.inventory_port);
        self.http
            .get(&url)
            .json(inventory)
            .timeout(Duration::from_secs(self.config.inventory_timeout_seconds))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("Listener {} rejected inventory", url))?;

        debug!(addr = %addr, devices = inventory.total_devices, "Inventory sent");
        Ok(())
    }
}

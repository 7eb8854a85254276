//! GPU capability negotiation for the compute strategy
//!
//! The compute back end needs a device with real compute-shader support.
//! Negotiation asks for a high-performance adapter first, falls back to a
//! low-power one, and otherwise declares the strategy unavailable; the
//! renderer then silently stays on the instanced path. A failed
//! negotiation is terminal for the session, never retried per frame.

/// Whether the compute strategy can run on this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeSupport {
    Ready,
    Unavailable,
}

/// Run the capability-negotiation chain and report compute support.
///
/// Blocks on the async adapter requests; called once at startup.
pub fn negotiate_compute_device() -> ComputeSupport {
    pollster::block_on(negotiate())
}

async fn negotiate() -> ComputeSupport {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

    let adapter = match request_adapter(&instance, wgpu::PowerPreference::HighPerformance).await {
        Some(adapter) => adapter,
        None => match request_adapter(&instance, wgpu::PowerPreference::LowPower).await {
            Some(adapter) => {
                log::info!("high-performance adapter unavailable, using low-power adapter");
                adapter
            }
            None => {
                log::warn!("no GPU adapter available, compute strategy disabled");
                return ComputeSupport::Unavailable;
            }
        },
    };

    let info = adapter.get_info();
    let downlevel = adapter.get_downlevel_capabilities();
    if !downlevel
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    {
        log::warn!(
            "adapter '{}' ({:?}) lacks compute shaders, compute strategy disabled",
            info.name,
            info.backend
        );
        return ComputeSupport::Unavailable;
    }

    log::info!(
        "compute strategy available on '{}' ({:?})",
        info.name,
        info.backend
    );
    ComputeSupport::Ready
}

async fn request_adapter(
    instance: &wgpu::Instance,
    power_preference: wgpu::PowerPreference,
) -> Option<wgpu::Adapter> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok()
}

//! GPU Device Provider: one D3D11 device for the whole process.

use windows::core::Interface;
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Win32::Foundation::{E_POINTER, HMODULE};
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, D3D11_CREATE_DEVICE_BGRA_SUPPORT,
    D3D11_SDK_VERSION,
};
use windows::Win32::Graphics::Dxgi::{IDXGIDevice, DXGI_ERROR_UNSUPPORTED};
use windows::Win32::System::WinRT::Direct3D11::CreateDirect3D11DeviceFromDXGIDevice;
use windows::Win32::System::WinRT::{RoInitialize, RO_INIT_SINGLETHREADED};
use tracing::{info, warn};
use wgcap_core::CaptureError;

/// D3D11 device, its immediate context, and the WinRT wrapper WGC needs.
pub struct GraphicsDevice {
    pub(crate) d3d: ID3D11Device,
    pub(crate) context: ID3D11DeviceContext,
    pub(crate) winrt: IDirect3DDevice,
}

impl GraphicsDevice {
    /// Create the device on a hardware adapter, or on WARP when the hardware
    /// path reports `DXGI_ERROR_UNSUPPORTED`.
    pub fn create() -> Result<Self, CaptureError> {
        // Initialise WinRT on this thread (no-op if already done)
        unsafe {
            let _ = RoInitialize(RO_INIT_SINGLETHREADED);
        }

        let (d3d, context) = match create_d3d_device(D3D_DRIVER_TYPE_HARDWARE) {
            Ok(pair) => pair,
            Err(e) if e.code() == DXGI_ERROR_UNSUPPORTED => {
                warn!("Hardware D3D11 device unsupported, falling back to WARP");
                create_d3d_device(D3D_DRIVER_TYPE_WARP).map_err(device_err("D3D11CreateDevice (WARP)"))?
            }
            Err(e) => return Err(device_err("D3D11CreateDevice")(e)),
        };

        let dxgi: IDXGIDevice = d3d.cast().map_err(device_err("cast IDXGIDevice"))?;
        let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi) }
            .map_err(device_err("CreateDirect3D11DeviceFromDXGIDevice"))?;
        let winrt: IDirect3DDevice = inspectable.cast().map_err(device_err("cast IDirect3DDevice"))?;

        info!("Graphics device ready");
        Ok(Self { d3d, context, winrt })
    }
}

fn create_d3d_device(
    driver_type: D3D_DRIVER_TYPE,
) -> windows::core::Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    unsafe {
        D3D11CreateDevice(
            None,
            driver_type,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }
    match (device, context) {
        (Some(device), Some(context)) => Ok((device, context)),
        _ => Err(E_POINTER.into()),
    }
}

fn device_err(call: &'static str) -> impl Fn(windows::core::Error) -> CaptureError {
    move |e| CaptureError::DeviceCreation { reason: format!("{call}: {e}") }
}

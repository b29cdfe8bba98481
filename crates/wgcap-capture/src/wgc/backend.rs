//! WGC frame pool, swap chain and session bound to one capture target.

use tracing::debug;
use windows::core::Interface;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::E_INVALIDARG;
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D, D3D11_CPU_ACCESS_READ,
    D3D11_MAPPED_SUBRESOURCE, D3D11_MAP_READ, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_ALPHA_MODE_PREMULTIPLIED, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGIAdapter, IDXGIDevice2, IDXGIFactory2, IDXGISwapChain1, DXGI_SCALING_STRETCH,
    DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};
use windows::Win32::System::WinRT::Direct3D11::IDirect3DDxgiInterfaceAccess;
use wgcap_core::{CaptureError, FrameSize};

use super::{frame_map_err, platform_err, to_frame_size, to_size_int32, CaptureTarget, GraphicsDevice};
use crate::backend::{CaptureBackend, CapturedFrame, MapResult, MappedView};

const PIXEL_FORMAT: DirectXPixelFormat = DirectXPixelFormat::B8G8R8A8UIntNormalized;
const BUFFER_COUNT: i32 = 2;

// ── WgcBackend ────────────────────────────────────────────────────────────────

pub struct WgcBackend {
    device:       ID3D11Device,
    context:      ID3D11DeviceContext,
    winrt_device: IDirect3DDevice,
    target:       CaptureTarget,
    pool:         Direct3D11CaptureFramePool,
    // Sized to the target; never presented.
    _swap_chain:  IDXGISwapChain1,
    session:      GraphicsCaptureSession,
}

impl WgcBackend {
    /// Allocate a swap chain and frame pool of the target's size and link a
    /// capture session to them. Nothing stays alive if any step fails.
    pub fn new(device: &GraphicsDevice, target: CaptureTarget) -> Result<Self, CaptureError> {
        let size = target.size();
        let swap_chain = create_swap_chain(&device.d3d, size)?;

        let pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &device.winrt,
            PIXEL_FORMAT,
            BUFFER_COUNT,
            to_size_int32(size),
        )
        .map_err(platform_err("Direct3D11CaptureFramePool::CreateFreeThreaded"))?;

        let session = match pool.CreateCaptureSession(&target.item) {
            Ok(session) => session,
            Err(e) => {
                let _ = pool.Close();
                return Err(platform_err("CreateCaptureSession")(e));
            }
        };

        debug!("Window {} frame pool created at {}", target.window_id(), size);
        Ok(Self {
            device: device.d3d.clone(),
            context: device.context.clone(),
            winrt_device: device.winrt.clone(),
            target,
            pool,
            _swap_chain: swap_chain,
            session,
        })
    }
}

impl CaptureBackend for WgcBackend {
    type Frame = WgcFrame;

    fn start(&mut self) -> Result<(), CaptureError> {
        self.session
            .StartCapture()
            .map_err(platform_err("GraphicsCaptureSession::StartCapture"))
    }

    fn try_next_frame(&mut self) -> Result<Option<WgcFrame>, CaptureError> {
        let Some(frame) = queued_frame(self.pool.TryGetNextFrame())? else {
            return Ok(None);
        };
        let texture = frame_texture(&frame)?;
        Ok(Some(WgcFrame {
            frame,
            texture,
            device: self.device.clone(),
            context: self.context.clone(),
        }))
    }

    fn recreate_pool(&mut self, size: FrameSize) -> Result<(), CaptureError> {
        self.pool
            .Recreate(&self.winrt_device, PIXEL_FORMAT, BUFFER_COUNT, to_size_int32(size))
            .map_err(platform_err("Direct3D11CaptureFramePool::Recreate"))
    }

    fn close(self) {
        let _ = self.pool.Close();
        let _ = self.session.Close();
        debug!("Window {} capture resources released", self.target.window_id());
    }
}

/// An empty pool comes back from the projection as a null result with a
/// success code. Any other failure (closed pool, removed device) is real.
fn queued_frame<T>(result: windows::core::Result<T>) -> Result<Option<T>, CaptureError> {
    match result {
        Ok(frame) => Ok(Some(frame)),
        Err(e) if e.code().is_ok() => Ok(None),
        Err(e) => Err(frame_map_err("Direct3D11CaptureFramePool::TryGetNextFrame")(e)),
    }
}

/// The D3D11 texture behind a frame's surface.
fn frame_texture(frame: &Direct3D11CaptureFrame) -> Result<ID3D11Texture2D, CaptureError> {
    let surface = frame.Surface().map_err(frame_map_err("Direct3D11CaptureFrame::Surface"))?;
    let access: IDirect3DDxgiInterfaceAccess = surface
        .cast()
        .map_err(frame_map_err("cast IDirect3DDxgiInterfaceAccess"))?;
    unsafe { access.GetInterface::<ID3D11Texture2D>() }
        .map_err(frame_map_err("IDirect3DDxgiInterfaceAccess::GetInterface"))
}

fn create_swap_chain(device: &ID3D11Device, size: FrameSize) -> Result<IDXGISwapChain1, CaptureError> {
    let dxgi_device: IDXGIDevice2 = device.cast().map_err(platform_err("cast IDXGIDevice2"))?;
    let adapter: IDXGIAdapter = unsafe { dxgi_device.GetParent() }
        .map_err(platform_err("IDXGIDevice::GetParent"))?;
    let factory: IDXGIFactory2 = unsafe { adapter.GetParent() }
        .map_err(platform_err("IDXGIAdapter::GetParent"))?;

    let desc = DXGI_SWAP_CHAIN_DESC1 {
        Width:       size.width,
        Height:      size.height,
        Format:      DXGI_FORMAT_B8G8R8A8_UNORM,
        SampleDesc:  DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
        BufferCount: BUFFER_COUNT as u32,
        Scaling:     DXGI_SCALING_STRETCH,
        SwapEffect:  DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL,
        AlphaMode:   DXGI_ALPHA_MODE_PREMULTIPLIED,
        ..Default::default()
    };
    unsafe { factory.CreateSwapChainForComposition(device, &desc, None) }
        .map_err(platform_err("IDXGIFactory2::CreateSwapChainForComposition"))
}

// ── WgcFrame ──────────────────────────────────────────────────────────────────

pub struct WgcFrame {
    frame:   Direct3D11CaptureFrame,
    texture: ID3D11Texture2D,
    device:  ID3D11Device,
    context: ID3D11DeviceContext,
}

impl CapturedFrame for WgcFrame {
    type View<'a> = MappedTexture;

    fn content_size(&self) -> Result<FrameSize, CaptureError> {
        self.frame
            .ContentSize()
            .map(to_frame_size)
            .map_err(frame_map_err("Direct3D11CaptureFrame::ContentSize"))
    }

    fn map_direct(&self) -> Result<MapResult<MappedTexture>, CaptureError> {
        match map_read(&self.context, &self.texture) {
            Ok(view) => Ok(MapResult::Direct(view)),
            // Not created with CPU read access
            Err(e) if e.code() == E_INVALIDARG => Ok(MapResult::NeedsStaging),
            Err(e) => Err(frame_map_err("ID3D11DeviceContext::Map")(e)),
        }
    }

    fn map_staged(&self) -> Result<MappedTexture, CaptureError> {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { self.texture.GetDesc(&mut desc) };
        desc.Usage = D3D11_USAGE_STAGING;
        desc.BindFlags = 0;
        desc.CPUAccessFlags = D3D11_CPU_ACCESS_READ.0 as u32;
        desc.MiscFlags = 0;

        let mut staging: Option<ID3D11Texture2D> = None;
        unsafe { self.device.CreateTexture2D(&desc, None, Some(&mut staging)) }
            .map_err(frame_map_err("CreateTexture2D (staging)"))?;
        let staging = staging.ok_or_else(|| CaptureError::FrameMap {
            reason: "CreateTexture2D returned no staging texture".to_owned(),
        })?;

        unsafe { self.context.CopyResource(&staging, &self.texture) };
        map_read(&self.context, &staging).map_err(frame_map_err("ID3D11DeviceContext::Map (staging)"))
    }
}

impl Drop for WgcFrame {
    fn drop(&mut self) {
        // Hand the buffer back to the pool now rather than at the next GC of the projection
        let _ = self.frame.Close();
    }
}

// ── MappedTexture ─────────────────────────────────────────────────────────────

/// Subresource 0 of a texture mapped with `D3D11_MAP_READ`; unmapped on drop.
pub struct MappedTexture {
    context:   ID3D11DeviceContext,
    texture:   ID3D11Texture2D,
    data:      *const u8,
    len:       usize,
    row_pitch: usize,
    extent:    FrameSize,
}

fn map_read(
    context: &ID3D11DeviceContext,
    texture: &ID3D11Texture2D,
) -> windows::core::Result<MappedTexture> {
    let mut desc = D3D11_TEXTURE2D_DESC::default();
    unsafe { texture.GetDesc(&mut desc) };

    let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
    unsafe { context.Map(texture, 0, D3D11_MAP_READ, 0, Some(&mut mapped))? };

    let extent = FrameSize::new(desc.Width, desc.Height);
    let row_pitch = mapped.RowPitch as usize;
    let rows = extent.height as usize;
    let len = if rows == 0 {
        0
    } else if row_pitch >= extent.stride() {
        row_pitch * (rows - 1) + extent.stride()
    } else {
        row_pitch * rows
    };

    Ok(MappedTexture {
        context: context.clone(),
        texture: texture.clone(),
        data: mapped.pData as *const u8,
        len,
        row_pitch,
        extent,
    })
}

impl MappedView for MappedTexture {
    fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    fn extent(&self) -> FrameSize {
        self.extent
    }

    fn bytes(&self) -> &[u8] {
        if self.data.is_null() || self.len == 0 {
            return &[];
        }
        // SAFETY: the subresource stays mapped until `drop`, and `len` never
        // exceeds the last row's end.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }
}

impl Drop for MappedTexture {
    fn drop(&mut self) {
        unsafe { self.context.Unmap(&self.texture, 0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::{E_FAIL, RO_E_CLOSED, S_OK};

    #[test]
    fn only_a_null_success_means_no_frame() {
        let empty: windows::core::Result<u32> = Err(S_OK.into());
        assert!(matches!(queued_frame(empty), Ok(None)));
        assert!(matches!(queued_frame(Ok(7u32)), Ok(Some(7))));

        for code in [RO_E_CLOSED, E_FAIL] {
            let failed: windows::core::Result<u32> = Err(code.into());
            assert!(matches!(queued_frame(failed), Err(CaptureError::FrameMap { .. })));
        }
    }
}

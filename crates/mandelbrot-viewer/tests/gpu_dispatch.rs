//! End-to-end dispatch tests. These need a GPU adapter: `cargo test -- --ignored`.

use mandelbrot_viewer::frame::{kernel_source, FrameDriver, KernelTransform, KERNEL_NAME};
use mandelbrot_viewer::gpu::{
    encode_textures, ComputeKernel, ComputeShader, Dispatch, DispatchMetrics, GpuContext,
    GpuError, GridSize, KernelArgs, SkipReason, DEFAULT_LANE_WIDTH,
};
use mandelbrot_viewer::renderer::targets::FrameTarget;
use planemap::{AffineMap, DVec2};
use std::sync::Arc;
use wgpu::util::DeviceExt;

fn setup() -> (GpuContext, Arc<DispatchMetrics>) {
    let metrics = Arc::new(DispatchMetrics::new().unwrap());
    let gpu = pollster::block_on(GpuContext::headless(metrics.clone())).expect("GPU adapter");
    (gpu, metrics)
}

fn encoder(gpu: &GpuContext) -> wgpu::CommandEncoder {
    gpu.device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("test") })
}

/// Reads an Rgba8 texture back as rows of pixels.
fn read_rgba(gpu: &GpuContext, texture: &wgpu::Texture) -> Vec<Vec<[u8; 4]>> {
    let (w, h) = (texture.width(), texture.height());
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = (w * 4).div_ceil(align) * align;

    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: (padded * h) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut enc = encoder(gpu);
    enc.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(h),
            },
        },
        texture.size(),
    );
    gpu.queue.submit(std::iter::once(enc.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |r| r.unwrap());
    gpu.device.poll(wgpu::Maintain::Wait);

    let data = slice.get_mapped_range();
    (0..h as usize)
        .map(|y| {
            let row = &data[y * padded as usize..][..w as usize * 4];
            row.chunks_exact(4)
                .map(|p| [p[0], p[1], p[2], p[3]])
                .collect()
        })
        .collect()
}

/// Pixel (0, 0) lands on -2.5 - 1i (escapes at once); the centre on the main cardioid.
fn test_map() -> AffineMap {
    AffineMap::from_scale(0.04).translate(DVec2::new(-2.5, -1.0))
}

#[test]
#[ignore = "requires a GPU adapter"]
fn frame_driver_renders_set() {
    let (gpu, metrics) = setup();
    let driver = FrameDriver::new(&gpu.device, DEFAULT_LANE_WIDTH, 128, metrics.clone()).unwrap();
    // 100×50 is not a multiple of the group shape, so trailing groups overhang.
    let target = FrameTarget::new(&gpu.device, 100, 50);

    let mut enc = encoder(&gpu);
    let dispatch = driver.encode_frame(
        &gpu.device,
        &gpu.queue,
        &mut enc,
        test_map(),
        Some(target.texture()),
    );
    gpu.queue.submit(std::iter::once(enc.finish()));

    let shape = driver.kernel().shape();
    assert_eq!(
        dispatch,
        Dispatch::Encoded {
            groups: shape.groups_for(GridSize::new(100, 50, 1))
        }
    );

    let pixels = read_rgba(&gpu, target.texture());
    assert_eq!(pixels[25][50], [0, 0, 0, 255], "cardioid is inside the set");
    let corner = pixels[0][0];
    assert_eq!(corner[3], 255);
    assert!(corner[..3].iter().any(|&c| c > 0), "far corner escapes");
    // Last row and column are written too.
    assert_eq!(pixels[49][99][3], 255);

    assert_eq!(metrics.dispatches(), 1);
    assert_eq!(metrics.skipped(), 0);
    assert_eq!(metrics.gpu_errors_total.get(), 0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn positional_and_indexed_bindings_render_identically() {
    let (gpu, metrics) = setup();
    let kernel = ComputeKernel::new(
        &gpu.device,
        KERNEL_NAME,
        &kernel_source(64),
        DEFAULT_LANE_WIDTH,
        metrics,
    )
    .unwrap();

    let params = gpu
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: bytemuck::bytes_of(&KernelTransform::from(test_map())),
            usage: wgpu::BufferUsages::UNIFORM,
        });
    let a = FrameTarget::new(&gpu.device, 64, 40);
    let b = FrameTarget::new(&gpu.device, 64, 40);

    let mut enc = encoder(&gpu);
    let positional = KernelArgs::from_slices(&[&params], &[a.texture()]);
    let indexed = KernelArgs::indexed([(0, &params)], [(0, b.texture())]);
    assert!(kernel.encode(&gpu.device, &mut enc, &positional, None).is_encoded());
    assert!(kernel.encode(&gpu.device, &mut enc, &indexed, None).is_encoded());
    gpu.queue.submit(std::iter::once(enc.finish()));

    assert_eq!(read_rgba(&gpu, a.texture()), read_rgba(&gpu, b.texture()));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn missing_destination_encodes_nothing() {
    let (gpu, metrics) = setup();
    let driver = FrameDriver::new(&gpu.device, DEFAULT_LANE_WIDTH, 16, metrics.clone()).unwrap();

    let mut enc = encoder(&gpu);
    let dispatch = driver.encode_frame(&gpu.device, &gpu.queue, &mut enc, test_map(), None);
    assert_eq!(dispatch, Dispatch::Skipped(SkipReason::NoDestination));

    // Texture-only helper with no textures has nothing to size the grid from.
    let dispatch = encode_textures(driver.kernel(), &gpu.device, &mut enc, &[]);
    assert_eq!(dispatch, Dispatch::Skipped(SkipReason::NoDestination));

    gpu.queue.submit(std::iter::once(enc.finish()));
    gpu.device.poll(wgpu::Maintain::Wait);

    assert_eq!(metrics.skipped_for(SkipReason::NoDestination), 2);
    assert_eq!(metrics.dispatches(), 0);
    assert_eq!(metrics.gpu_errors_total.get(), 0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn oversized_grid_is_skipped() {
    let (gpu, metrics) = setup();
    let driver = FrameDriver::new(&gpu.device, DEFAULT_LANE_WIDTH, 16, metrics.clone()).unwrap();
    let target = FrameTarget::new(&gpu.device, 8, 8);

    let limit = gpu.device.limits().max_compute_workgroups_per_dimension;
    let too_wide = GridSize::new((limit + 1) * driver.kernel().shape().width(), 1, 1);

    let mut enc = encoder(&gpu);
    let args = KernelArgs::default().texture(0, target.texture());
    let dispatch = driver
        .kernel()
        .encode(&gpu.device, &mut enc, &args, Some(too_wide));
    assert_eq!(dispatch, Dispatch::Skipped(SkipReason::GridTooLarge));
    assert_eq!(metrics.skipped_for(SkipReason::GridTooLarge), 1);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn invalid_kernel_is_unavailable() {
    let (gpu, metrics) = setup();
    let result = ComputeKernel::new(
        &gpu.device,
        "broken",
        "@compute @workgroup_size(WORKGROUP_X) fn broken() { let x: u32 = 1.5; }",
        DEFAULT_LANE_WIDTH,
        metrics.clone(),
    );
    match result {
        Err(GpuError::KernelUnavailable { name, .. }) => assert_eq!(name, "broken"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("broken kernel compiled"),
    }
    // Captured by the error scope, not the uncaptured handler.
    assert_eq!(metrics.gpu_errors_total.get(), 0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn shape_respects_device_limits() {
    let (gpu, metrics) = setup();
    let kernel = ComputeKernel::new(
        &gpu.device,
        KERNEL_NAME,
        &kernel_source(16),
        DEFAULT_LANE_WIDTH,
        metrics,
    )
    .unwrap();
    let limits = gpu.device.limits();
    let shape = kernel.shape();
    assert!(shape.lanes() <= limits.max_compute_invocations_per_workgroup);
    assert!(shape.width() <= limits.max_compute_workgroup_size_x);
    assert_eq!(shape.depth(), 1);
    assert_eq!(kernel.name(), KERNEL_NAME);
}

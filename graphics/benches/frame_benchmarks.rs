use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use glam::Vec3;

use redlilium_frame::backend::PipelineBindPoint;
use redlilium_frame::renderer::{MeshQueue, dispatch_grid};
use redlilium_frame::types::{BufferDescriptor, BufferUsage, GpuBufferHandle};
use redlilium_frame::{
    Buffer, BufferKind, BufferSpecification, Camera, DummyBackend, GeometryBuffers, GpuBackend,
    GpuObject, LightManager, Mesh, MeshAllocation, MeshComponent, MeshId, RenderContext, Renderer,
    RendererConfig, RendererPipelines, ResourceLifetimeTracker, RingBuffer, TransformComponent,
};

fn meshes(count: u32) -> Vec<MeshComponent> {
    (0..count)
        .map(|id| {
            MeshComponent::new(Mesh::loaded(
                MeshId(id),
                format!("mesh {id}"),
                MeshAllocation::new(id * 36, 36),
                MeshAllocation::new(id * 24, 24),
            ))
        })
        .collect()
}

fn transforms(count: usize) -> Vec<TransformComponent> {
    (0..count)
        .map(|i| TransformComponent::from_translation(Vec3::new(i as f32, 0.0, 0.0)))
        .collect()
}

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

fn bench_queue_batching(c: &mut Criterion) {
    let components = meshes(64);
    let transforms = transforms(4096);

    c.bench_function("mesh_queue_4096_instances_64_meshes", |b| {
        let mut queue = MeshQueue::new();
        b.iter(|| {
            queue.clear();
            for (i, transform) in transforms.iter().enumerate() {
                let component = &components[i % components.len()];
                if let Some(mesh) = component.drawable_mesh() {
                    queue.push(mesh, component, transform);
                }
            }
            black_box(queue.assign_instance_offsets());
        });
    });
}

fn bench_dispatch_grid(c: &mut Criterion) {
    c.bench_function("dispatch_grid", |b| {
        b.iter(|| {
            for meshes in (0..1024u32).step_by(7) {
                black_box(dispatch_grid(black_box(meshes), black_box(meshes / 3)));
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

fn bench_lifetime_tracking(c: &mut Criterion) {
    c.bench_function("lifetime_track_retire_4_frames_256_objects", |b| {
        b.iter_batched(
            || {
                (
                    DummyBackend::with_frame_count(3),
                    ResourceLifetimeTracker::new(3),
                )
            },
            |(backend, tracker)| {
                for frame in 0..4u64 {
                    tracker.begin_frame(frame, &backend);
                    for raw in 1..=256u64 {
                        let handle = GpuBufferHandle::from_raw(frame * 256 + raw);
                        let object = GpuObject::Buffer(handle);
                        tracker.track(object);
                        tracker.retire(object);
                    }
                }
                black_box(tracker.pending_count())
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_ring_acquire(c: &mut Criterion) {
    let backend = Arc::new(DummyBackend::with_frame_count(3));
    let mut ctx = RenderContext::new(backend.clone(), &RendererConfig::default()).unwrap();
    let mut ring = RingBuffer::<Buffer>::create(
        &mut ctx,
        &BufferSpecification::new("camera", 256, BufferKind::Uniform),
    )
    .unwrap();
    let data = [0u8; 256];

    c.bench_function("ring_acquire_and_write", |b| {
        b.iter(|| {
            ctx.begin_frame().unwrap();
            let buffer = ring.acquire_next(&ctx).unwrap();
            buffer.set_data(&ctx, black_box(&data), 0).unwrap();
            let cmd = backend.begin_command_buffer().unwrap();
            ctx.lifetimes().track(GpuObject::CommandBuffer(cmd));
            ctx.end_frame(cmd).unwrap();
        });
    });

    ring.shutdown(&mut ctx);
}

// ---------------------------------------------------------------------------
// Full frame
// ---------------------------------------------------------------------------

fn bench_renderer_frame(c: &mut Criterion) {
    let config = RendererConfig::default();
    let backend = Arc::new(DummyBackend::with_frame_count(3));
    let mut ctx = RenderContext::new(backend.clone(), &config).unwrap();
    let pipelines = RendererPipelines {
        cull: backend.create_pipeline("cull", PipelineBindPoint::Compute),
        mesh: backend.create_pipeline("mesh", PipelineBindPoint::Graphics),
    };
    let geometry = GeometryBuffers {
        vertex: backend
            .create_buffer(&BufferDescriptor::new(1 << 20, BufferUsage::VERTEX))
            .unwrap(),
        index: backend
            .create_buffer(&BufferDescriptor::new(1 << 20, BufferUsage::INDEX))
            .unwrap(),
    };
    let mut renderer = Renderer::new(&mut ctx, config, pipelines, geometry).unwrap();

    let camera = Camera::perspective(1.0, 16.0 / 9.0, 0.1, 100.0).looking_at(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::ZERO,
        Vec3::Y,
    );
    let lights = LightManager::new(16);
    let components = meshes(32);
    let transforms = transforms(1024);

    c.bench_function("renderer_frame_1024_instances", |b| {
        b.iter(|| {
            renderer.begin_frame(&mut ctx).unwrap();
            renderer.begin_scene(&mut ctx, &camera, &lights).unwrap();
            for (i, transform) in transforms.iter().enumerate() {
                renderer
                    .render_mesh(&components[i % components.len()], transform)
                    .unwrap();
            }
            black_box(renderer.end_scene(&mut ctx).unwrap());
            renderer.end_frame(&mut ctx).unwrap();
        });
    });

    renderer.shutdown(&mut ctx);
    ctx.shutdown().unwrap();
}

criterion_group!(
    benches,
    bench_queue_batching,
    bench_dispatch_grid,
    bench_lifetime_tracking,
    bench_ring_acquire,
    bench_renderer_frame,
);
criterion_main!(benches);

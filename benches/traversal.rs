use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, black_box};

use tiletrav::implicit::{
    AvailabilityDescriptor, AvailabilityInfo, BufferAvailability, BufferSlice, SubdivisionScheme,
    Subtree, TreeCoordinates, encode_subtree,
};
use tiletrav::math::morton::{decode_morton_3d, encode_morton_2d, encode_morton_3d};
use tiletrav::tileset::{MemoryResourceResolver, Tileset};
use tiletrav::traversal::{TilesetTraverser, TraversalOptions};

fn bench_morton_encode(c: &mut Criterion) {
    c.bench_function("morton_encode_2d_3d", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for i in 0..1024u32 {
                acc ^= encode_morton_2d(black_box(i), black_box(i ^ 0x155));
                acc ^= encode_morton_3d(black_box(i), black_box(i >> 1), black_box(i >> 2));
            }
            black_box(acc)
        });
    });

    c.bench_function("morton_decode_3d", |b| {
        b.iter(|| {
            for code in 0..1024u64 {
                black_box(decode_morton_3d(black_box(code)));
            }
        });
    });
}

fn bench_global_index(c: &mut Criterion) {
    let root = TreeCoordinates::root(SubdivisionScheme::Octree);
    let descendants = root.descendants(4, true);

    c.bench_function("octree_descendants_global_index_l4", |b| {
        b.iter(|| {
            let sum: u64 = descendants.iter().map(|c| c.to_global_index()).sum();
            black_box(sum)
        });
    });
}

fn bench_availability_lookup(c: &mut Criterion) {
    let length = SubdivisionScheme::Quadtree.nodes_in_levels(8);
    let bytes: Vec<u8> = (0..length.div_ceil(8)).map(|i| (i * 37 % 251) as u8).collect();
    let availability = BufferAvailability::new(BufferSlice::from_vec(bytes), length)
        .expect("bitstream covers the length");

    c.bench_function("buffer_availability_lookup", |b| {
        b.iter(|| {
            let mut available = 0u64;
            for index in (0..length).step_by(7) {
                if availability.is_available(black_box(index)).unwrap_or(false) {
                    available += 1;
                }
            }
            black_box(available)
        });
    });
}

fn bench_implicit_walk(c: &mut Criterion) {
    let subtree = Subtree {
        tile_availability: AvailabilityDescriptor::constant(true),
        content_availability: vec![AvailabilityDescriptor::constant(true)],
        child_subtree_availability: AvailabilityDescriptor::constant(false),
        ..Default::default()
    };
    let resolver = Arc::new(MemoryResourceResolver::new([(
        "subtrees/0.0.0.subtree",
        encode_subtree(&subtree, &[]).expect("subtree encodes"),
    )]));
    let tileset = Tileset::from_slice(
        br#"{
            "asset": { "version": "1.1" },
            "geometricError": 512,
            "root": {
                "boundingVolume": { "region": [-1.0, -0.5, 1.0, 0.5, 0, 100] },
                "geometricError": 256,
                "refine": "REPLACE",
                "content": { "uri": "content/{level}/{x}/{y}.glb" },
                "implicitTiling": {
                    "subdivisionScheme": "QUADTREE",
                    "subtreeLevels": 6,
                    "availableLevels": 6,
                    "subtrees": { "uri": "subtrees/{level}.{x}.{y}.subtree" }
                }
            }
        }"#,
    )
    .expect("tileset parses");
    let traverser = TilesetTraverser::new(resolver, TraversalOptions::default());

    c.bench_function("implicit_quadtree_walk_6_levels", |b| {
        b.iter(|| {
            let stats = pollster::block_on(traverser.traverse(&tileset, |tile| {
                black_box(tile.contents().len());
                Ok(true)
            }))
            .expect("walk succeeds");
            black_box(stats.visited)
        });
    });
}

criterion_group!(
    benches,
    bench_morton_encode,
    bench_global_index,
    bench_availability_lookup,
    bench_implicit_walk,
);
criterion_main!(benches);

use asp_attestation::{
    circuit, utils::identity_leaf, AttestationInputs, MerkleTree, ProofVerifier, CIRCUIT_K,
    TREE_CAPACITY,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use halo2_proofs::poly::commitment::Params;
use pasta_curves::{pallas, vesta};

fn leaves(count: usize) -> Vec<pallas::Base> {
    (0..count)
        .map(|i| identity_leaf(&format!("bench-identity-{i}")))
        .collect()
}

fn bench_proof_generation(c: &mut Criterion) {
    let params: Params<_> = Params::<vesta::Affine>::new(CIRCUIT_K);
    let (prover, _) = circuit::setup(params).unwrap();

    let mut group = c.benchmark_group("proof_generation");
    group.sample_size(10);

    for leaf_count in [2, 8, TREE_CAPACITY].iter() {
        let leaves = leaves(*leaf_count);
        let tree = MerkleTree::build(&leaves).unwrap();
        let inputs = AttestationInputs::for_leaf(&tree, leaf_count - 1, leaves[0]).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| b.iter(|| black_box(prover.prove(&inputs).unwrap())),
        );
    }

    group.finish();
}

fn bench_proof_verification(c: &mut Criterion) {
    let params: Params<_> = Params::<vesta::Affine>::new(CIRCUIT_K);
    let (prover, verifier) = circuit::setup(params).unwrap();

    let leaves = leaves(TREE_CAPACITY);
    let tree = MerkleTree::build(&leaves).unwrap();
    let inputs = AttestationInputs::for_leaf(&tree, 5, leaves[9]).unwrap();
    let proof = prover.prove(&inputs).unwrap();

    c.bench_function("proof_verification", |b| {
        b.iter(|| black_box(verifier.verify(&proof, &inputs.public).unwrap()))
    });
}

fn bench_key_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_generation");
    group.sample_size(10);
    group.bench_function("setup", |b| {
        b.iter(|| black_box(circuit::setup(Params::<vesta::Affine>::new(CIRCUIT_K)).unwrap()))
    });
    group.finish();
}

fn bench_merkle_tree_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_tree_construction");

    for leaf_count in [1, 4, 8, TREE_CAPACITY].iter() {
        let leaves = leaves(*leaf_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| b.iter(|| black_box(MerkleTree::build(black_box(&leaves)).unwrap())),
        );
    }

    group.finish();
}

fn bench_merkle_path(c: &mut Criterion) {
    let tree = MerkleTree::build(&leaves(TREE_CAPACITY)).unwrap();
    c.bench_function("merkle_path", |b| {
        b.iter(|| black_box(tree.path_for(black_box(7)).unwrap()))
    });
}

fn bench_poseidon_hash(c: &mut Criterion) {
    c.bench_function("poseidon_hash", |b| {
        b.iter(|| {
            black_box(asp_attestation::utils::poseidon_hash(
                black_box(pallas::Base::from(42)),
                black_box(pallas::Base::from(99)),
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_proof_generation,
    bench_proof_verification,
    bench_key_generation,
    bench_merkle_tree_construction,
    bench_merkle_path,
    bench_poseidon_hash
);
criterion_main!(benches);

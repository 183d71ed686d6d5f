//! Halo2 attestation circuit and its prover/verifier backends.
//!
//! Public inputs (instance column, in order): `root`, `knownBadLeafHash`.
//! Private inputs: `leaf`, `pathElements[TREE_DEPTH]`, `pathIndices[TREE_DEPTH]`.
//!
//! Constraints:
//! 1. Every `pathIndices[k]` is boolean.
//! 2. Folding `leaf` with the siblings, left/right chosen by the index bit,
//!    through Poseidon ends at `root`.
//! 3. An is-equal gadget over `leaf` and `knownBadLeafHash` outputs 0.
//!
//! # Limitation
//!
//! Constraint 3 compares the proven leaf against one designated bad leaf.
//! It does not show that an identity is absent from the whole exclusion set;
//! that would need a sorted-range or sparse Merkle non-membership proof.

use crate::error::{AttestationError, Result};
use crate::prover::{AttestationProof, ProofGenerator, ProofVerifier};
use crate::witness::{AttestationInputs, PrivateInputs, PublicSignals};
use crate::TREE_DEPTH;
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{Layouter, SimpleFloorPlanner, Value},
    plonk::{
        create_proof, keygen_pk, keygen_vk, verify_proof, Advice, Circuit, Column,
        ConstraintSystem, Error, Expression, Instance, ProvingKey, Selector, SingleVerifier,
        VerifyingKey,
    },
    poly::{commitment::Params, Rotation},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::{debug, info, warn};
use pasta_curves::group::ff::Field;
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

/// Instance row of the Merkle root.
pub const ROOT_ROW: usize = 0;
/// Instance row of the known bad leaf hash.
pub const KNOWN_BAD_LEAF_ROW: usize = 1;

type PoseidonChip = Pow5Chip<pallas::Base, 3, 2>;

#[derive(Debug, Clone)]
pub struct AttestationConfig {
    advice: [Column<Advice>; 5],
    path_selector: Selector,
    inequality_selector: Selector,
    poseidon: Pow5Config<pallas::Base, 3, 2>,
    instance: Column<Instance>,
}

/// The attestation statement. Holds only private witnesses; public signals
/// are read from the instance column.
#[derive(Debug, Clone, Copy)]
pub struct AttestationCircuit {
    pub leaf: Value<pallas::Base>,
    pub path_elements: [Value<pallas::Base>; TREE_DEPTH],
    pub path_indices: [Value<pallas::Base>; TREE_DEPTH],
}

impl Default for AttestationCircuit {
    fn default() -> Self {
        Self {
            leaf: Value::unknown(),
            path_elements: [Value::unknown(); TREE_DEPTH],
            path_indices: [Value::unknown(); TREE_DEPTH],
        }
    }
}

impl AttestationCircuit {
    #[must_use]
    pub fn new(private: &PrivateInputs) -> Self {
        Self {
            leaf: Value::known(private.leaf),
            path_elements: private.path_elements.map(Value::known),
            path_indices: private.path_indices.map(Value::known),
        }
    }
}

impl Circuit<pallas::Base> for AttestationCircuit {
    type Config = AttestationConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::default()
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advice = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        for column in &advice {
            meta.enable_equality(*column);
        }
        let instance = meta.instance_column();
        meta.enable_equality(instance);

        let rc_a = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        meta.enable_constant(rc_b[0]);
        let poseidon = PoseidonChip::configure::<P128Pow5T3>(
            meta,
            [advice[0], advice[1], advice[2]],
            advice[3],
            rc_a,
            rc_b,
        );

        // Row layout: node | sibling | left | right | bit
        let path_selector = meta.selector();
        meta.create_gate("merkle path level", |meta| {
            let s = meta.query_selector(path_selector);
            let node = meta.query_advice(advice[0], Rotation::cur());
            let sibling = meta.query_advice(advice[1], Rotation::cur());
            let left = meta.query_advice(advice[2], Rotation::cur());
            let right = meta.query_advice(advice[3], Rotation::cur());
            let bit = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::ONE);

            vec![
                s.clone() * bit.clone() * (one - bit.clone()),
                s.clone()
                    * (left - (node.clone() + bit.clone() * (sibling.clone() - node.clone()))),
                s * (right - (sibling.clone() + bit * (node - sibling))),
            ]
        });

        // Row layout: leaf | known bad leaf | inverse | is_equal
        let inequality_selector = meta.selector();
        meta.create_gate("leaf equality test", |meta| {
            let s = meta.query_selector(inequality_selector);
            let leaf = meta.query_advice(advice[0], Rotation::cur());
            let bad = meta.query_advice(advice[1], Rotation::cur());
            let inverse = meta.query_advice(advice[2], Rotation::cur());
            let is_equal = meta.query_advice(advice[3], Rotation::cur());
            let one = Expression::Constant(pallas::Base::ONE);
            let diff = leaf - bad;

            vec![
                s.clone() * (is_equal.clone() - (one - diff.clone() * inverse)),
                s * diff * is_equal,
            ]
        });

        AttestationConfig {
            advice,
            path_selector,
            inequality_selector,
            poseidon,
            instance,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> std::result::Result<(), Error> {
        let leaf = layouter.assign_region(
            || "private leaf",
            |mut region| region.assign_advice(|| "leaf", config.advice[0], 0, || self.leaf),
        )?;

        layouter.assign_region(
            || "leaf differs from known bad leaf",
            |mut region| {
                config.inequality_selector.enable(&mut region, 0)?;
                leaf.copy_advice(|| "leaf", &mut region, config.advice[0], 0)?;
                let bad = region.assign_advice_from_instance(
                    || "known bad leaf",
                    config.instance,
                    KNOWN_BAD_LEAF_ROW,
                    config.advice[1],
                    0,
                )?;

                let diff = self.leaf.zip(bad.value().map(|b| *b)).map(|(l, b)| l - b);
                region.assign_advice(
                    || "inverse",
                    config.advice[2],
                    0,
                    || diff.map(|d| d.invert().unwrap_or(pallas::Base::ZERO)),
                )?;
                let is_equal = region.assign_advice(
                    || "is equal",
                    config.advice[3],
                    0,
                    || {
                        diff.map(|d| {
                            if d == pallas::Base::ZERO {
                                pallas::Base::ONE
                            } else {
                                pallas::Base::ZERO
                            }
                        })
                    },
                )?;
                region.constrain_constant(is_equal.cell(), pallas::Base::ZERO)
            },
        )?;

        let mut node = leaf;
        for level in 0..TREE_DEPTH {
            let sibling = self.path_elements[level];
            let bit = self.path_indices[level];

            let (left, right) = layouter.assign_region(
                || format!("order children at level {level}"),
                |mut region| {
                    config.path_selector.enable(&mut region, 0)?;
                    let current = node.copy_advice(|| "node", &mut region, config.advice[0], 0)?;
                    region.assign_advice(|| "sibling", config.advice[1], 0, || sibling)?;
                    region.assign_advice(|| "direction", config.advice[4], 0, || bit)?;

                    let current = current.value().map(|v| *v);
                    let left = region.assign_advice(
                        || "left",
                        config.advice[2],
                        0,
                        || {
                            current
                                .zip(sibling)
                                .zip(bit)
                                .map(|((n, s), b)| n + b * (s - n))
                        },
                    )?;
                    let right = region.assign_advice(
                        || "right",
                        config.advice[3],
                        0,
                        || {
                            current
                                .zip(sibling)
                                .zip(bit)
                                .map(|((n, s), b)| s + b * (n - s))
                        },
                    )?;
                    Ok((left, right))
                },
            )?;

            let chip = PoseidonChip::construct(config.poseidon.clone());
            let hasher = PoseidonHash::<
                pallas::Base,
                PoseidonChip,
                P128Pow5T3,
                ConstantLength<2>,
                3,
                2,
            >::init(chip, layouter.namespace(|| format!("poseidon init {level}")))?;
            node = hasher.hash(
                layouter.namespace(|| format!("poseidon level {level}")),
                [left, right],
            )?;
        }

        layouter.constrain_instance(node.cell(), config.instance, ROOT_ROW)
    }
}

/// Runs the one-time key generation over the witness-free circuit.
///
/// The proving key goes to the prover, the verifying key to the verifier.
pub fn setup(params: Params<vesta::Affine>) -> Result<(Halo2Prover, Halo2Verifier)> {
    let params = Arc::new(params);
    let circuit = AttestationCircuit::default();

    info!("Generating attestation proving and verifying keys");
    let vk = keygen_vk(params.as_ref(), &circuit)?;
    let pk = keygen_pk(params.as_ref(), vk.clone(), &circuit)?;

    Ok((
        Halo2Prover {
            params: Arc::clone(&params),
            pk: Arc::new(pk),
        },
        Halo2Verifier {
            params,
            vk: Arc::new(vk),
        },
    ))
}

/// Loads IPA parameters for `k` from `cache_dir`, generating and writing
/// them on first use. The file name carries `k`, so a changed circuit size
/// never picks up stale parameters.
pub fn load_or_generate_params(cache_dir: &Path, k: u32) -> Result<Params<vesta::Affine>> {
    let path = cache_dir.join(format!("params_k{k}.bin"));
    if path.exists() {
        debug!("Reading params from {}", path.display());
        let file = fs::File::open(&path)?;
        match Params::<vesta::Affine>::read(&mut BufReader::new(file)) {
            Ok(params) => return Ok(params),
            Err(e) => warn!("Cached params at {} unreadable ({e}); regenerating", path.display()),
        }
    }

    let params = Params::<vesta::Affine>::new(k);
    fs::create_dir_all(cache_dir)?;
    let file = fs::File::create(&path)?;
    params.write(&mut BufWriter::new(file))?;
    info!("Wrote params to {}", path.display());
    Ok(params)
}

/// Halo2 prover holding the proving key.
#[derive(Clone)]
pub struct Halo2Prover {
    params: Arc<Params<vesta::Affine>>,
    pk: Arc<ProvingKey<vesta::Affine>>,
}

impl Halo2Prover {
    /// Checks the witness natively, then produces the proof bytes.
    pub fn prove(&self, inputs: &AttestationInputs) -> Result<Vec<u8>> {
        inputs.check()?;

        let circuit = AttestationCircuit::new(&inputs.private);
        let public_inputs = inputs.public.to_vec();
        let public_inputs_slice: &[&[&[pallas::Base]]] = &[&[&public_inputs]];

        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        create_proof(
            self.params.as_ref(),
            self.pk.as_ref(),
            &[circuit],
            public_inputs_slice,
            OsRng,
            &mut transcript,
        )?;

        let proof = transcript.finalize();
        debug!("Attestation proof generated, size: {} bytes", proof.len());
        Ok(proof)
    }
}

impl ProofGenerator for Halo2Prover {
    fn generate(&self, public: &PublicSignals, private: &PrivateInputs) -> Result<AttestationProof> {
        let inputs = AttestationInputs {
            public: *public,
            private: *private,
        };
        Ok(AttestationProof {
            proof: self.prove(&inputs)?,
            public_signals: *public,
        })
    }
}

/// Halo2 verifier holding the verifying key.
#[derive(Clone)]
pub struct Halo2Verifier {
    params: Arc<Params<vesta::Affine>>,
    vk: Arc<VerifyingKey<vesta::Affine>>,
}

impl ProofVerifier for Halo2Verifier {
    fn verify(&self, proof: &[u8], public_signals: &PublicSignals) -> Result<()> {
        if proof.is_empty() {
            return Err(AttestationError::MalformedProof("proof is empty".into()));
        }

        let public_inputs = public_signals.to_vec();
        let public_inputs_slice: &[&[&[pallas::Base]]] = &[&[&public_inputs]];
        let mut remaining = proof;

        let result = {
            let strategy = SingleVerifier::new(self.params.as_ref());
            let mut transcript =
                Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(&mut remaining);
            verify_proof(
                self.params.as_ref(),
                self.vk.as_ref(),
                strategy,
                public_inputs_slice,
                &mut transcript,
            )
        };

        match result {
            Ok(()) if remaining.is_empty() => Ok(()),
            Ok(()) => Err(AttestationError::MalformedProof(format!(
                "{} trailing bytes after proof",
                remaining.len()
            ))),
            Err(Error::Transcript(e)) => Err(AttestationError::MalformedProof(format!(
                "proof encoding could not be read: {e}"
            ))),
            Err(e) => Err(AttestationError::VerificationRejected(format!("{e:?}"))),
        }
    }
}

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::DatasetError;
use crate::pipeline::collate::{collate_to_shortest, BatchItem};
use crate::pipeline::traits::ExampleSource;

// Keeps collation offsets on a different randomness stream than example
// construction for the same epoch/index.
const COLLATE_STREAM: u64 = 0x636f_6c6c_6174_6531;

/// Assembles batches from an [`ExampleSource`].
///
/// Per-example construction is stateless apart from file reads, so each
/// batch's examples are built concurrently on a worker pool, each with its
/// own rng. Collation is the synchronization point: it runs only once every
/// example in the batch is ready, then computes the batch's shared length.
///
/// An epoch is finite and re-iterable; cycling forever is the training
/// loop's concern, not this loader's.
pub struct BatchLoader<S: ExampleSource> {
    source: S,
    batch_size: usize,
    pool: Option<rayon::ThreadPool>,
    shuffle: bool,
    seed: Option<u64>,
}

impl<S> BatchLoader<S>
where
    S: ExampleSource,
    S::Item: BatchItem,
{
    pub fn new(source: S, batch_size: usize) -> Result<Self, DatasetError> {
        if batch_size == 0 {
            return Err(DatasetError::invalid_input("batch size must be >= 1"));
        }
        if source.is_empty() {
            return Err(DatasetError::invalid_input(
                "cannot build batches from an empty source",
            ));
        }
        Ok(Self {
            source,
            batch_size,
            pool: None,
            shuffle: false,
            seed: None,
        })
    }

    /// Bound the worker pool used for per-batch example construction.
    /// Without this, the global rayon pool is used.
    pub fn with_workers(mut self, workers: usize) -> Result<Self, DatasetError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| DatasetError::runtime("build worker pool", e))?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Reshuffle the traversal order on every epoch.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Fix the base seed so crop offsets and masks are reproducible in tests.
    /// Unseeded loaders draw from entropy; examples stay independent either way.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.source.len().div_ceil(self.batch_size)
    }

    /// One full traversal of the source. `epoch` decorrelates shuffling and
    /// randomized choices across repeated traversals under a fixed seed.
    pub fn epoch(&self, epoch: u64) -> EpochIter<'_, S> {
        let mut indices: Vec<usize> = (0..self.source.len()).collect();
        if self.shuffle {
            indices.shuffle(&mut self.stream_rng(epoch, 0, COLLATE_STREAM));
        }
        EpochIter {
            loader: self,
            indices,
            cursor: 0,
            epoch,
        }
    }

    /// Build and collate one batch; returns only after every example in
    /// `indices` has been constructed.
    pub fn assemble(
        &self,
        epoch: u64,
        indices: &[usize],
    ) -> Result<<S::Item as BatchItem>::Batch, DatasetError> {
        if indices.is_empty() {
            return Err(DatasetError::invalid_input("cannot assemble an empty batch"));
        }
        let build = || {
            indices
                .par_iter()
                .map(|&index| {
                    let mut rng = self.stream_rng(epoch, index as u64, 0);
                    self.source.get(index, &mut rng)
                })
                .collect::<Result<Vec<S::Item>, DatasetError>>()
        };
        let items = match &self.pool {
            Some(pool) => pool.install(build),
            None => build(),
        }?;
        let mut rng = self.stream_rng(epoch, indices[0] as u64, COLLATE_STREAM);
        collate_to_shortest(&items, &mut rng)
    }

    fn stream_rng(&self, epoch: u64, index: u64, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(
                seed ^ stream
                    ^ epoch.wrapping_mul(0x9e37_79b9_7f4a_7c15)
                    ^ index.wrapping_mul(0xd1b5_4a32_d192_ed03),
            ),
            None => StdRng::from_entropy(),
        }
    }
}

/// Iterator over one epoch's collated batches.
pub struct EpochIter<'a, S: ExampleSource> {
    loader: &'a BatchLoader<S>,
    indices: Vec<usize>,
    cursor: usize,
    epoch: u64,
}

impl<S> Iterator for EpochIter<'_, S>
where
    S: ExampleSource,
    S::Item: BatchItem,
{
    type Item = Result<<S::Item as BatchItem>::Batch, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.indices.len());
        let chunk = &self.indices[self.cursor..end];
        self.cursor = end;
        Some(self.loader.assemble(self.epoch, chunk))
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{Device, Tensor};
    use rand::RngCore;

    use crate::types::Example;

    use super::*;

    /// Synthetic source: example `i` has `20 + i` frames of constant value `i`.
    struct RampSource {
        count: usize,
    }

    impl ExampleSource for RampSource {
        type Item = Example;

        fn len(&self) -> usize {
            self.count
        }

        fn get(&self, index: usize, _rng: &mut dyn RngCore) -> Result<Example, DatasetError> {
            let frames = 20 + index;
            let tokens = Tensor::from_vec(vec![index as u32; frames], frames, &Device::Cpu)
                .map_err(|e| DatasetError::runtime("tokens", e))?;
            let audio = Tensor::from_vec(vec![index as f32; frames], (frames, 1), &Device::Cpu)
                .map_err(|e| DatasetError::runtime("audio", e))?;
            Ok(Example {
                tokens,
                audio,
                mask: None,
            })
        }
    }

    #[test]
    fn epoch_covers_every_example_once() {
        let loader = BatchLoader::new(RampSource { count: 10 }, 4)
            .expect("loader")
            .with_seed(1);
        assert_eq!(loader.batches_per_epoch(), 3);

        let mut seen = vec![0usize; 10];
        for batch in loader.epoch(0) {
            let batch = batch.expect("batch");
            let tokens = batch.tokens.to_vec2::<u32>().expect("tokens");
            for row in tokens {
                seen[row[0] as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn batches_crop_to_shortest_member() {
        let loader = BatchLoader::new(RampSource { count: 8 }, 4)
            .expect("loader")
            .with_seed(2);
        let mut lengths = Vec::new();
        for batch in loader.epoch(0) {
            let batch = batch.expect("batch");
            lengths.push(batch.tokens.dims()[1]);
        }
        // Unshuffled traversal: chunks are [0..4) and [4..8).
        assert_eq!(lengths, vec![20, 24]);
    }

    #[test]
    fn shuffled_epochs_differ_but_stay_complete() {
        let loader = BatchLoader::new(RampSource { count: 16 }, 4)
            .expect("loader")
            .with_seed(3)
            .with_shuffle(true);
        let collect_ids = |epoch: u64| {
            let mut ids = Vec::new();
            for batch in loader.epoch(epoch) {
                let tokens = batch.expect("batch").tokens.to_vec2::<u32>().expect("tokens");
                ids.extend(tokens.iter().map(|row| row[0]));
            }
            ids
        };
        let first = collect_ids(0);
        let second = collect_ids(1);
        assert_ne!(first, second);
        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..16).collect::<Vec<u32>>());
    }

    #[test]
    fn seeded_epochs_are_reproducible() {
        let loader = BatchLoader::new(RampSource { count: 6 }, 3)
            .expect("loader")
            .with_seed(7)
            .with_shuffle(true);
        let lengths = |_: ()| {
            loader
                .epoch(5)
                .map(|batch| batch.expect("batch").tokens.dims()[1])
                .collect::<Vec<_>>()
        };
        assert_eq!(lengths(()), lengths(()));
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(BatchLoader::new(RampSource { count: 0 }, 4).is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(BatchLoader::new(RampSource { count: 4 }, 0).is_err());
    }

    #[test]
    fn bounded_pool_assembles_batches() {
        let loader = BatchLoader::new(RampSource { count: 12 }, 6)
            .expect("loader")
            .with_workers(2)
            .expect("pool")
            .with_seed(9);
        let batch = loader.assemble(0, &[0, 1, 2, 3, 4, 5]).expect("batch");
        assert_eq!(batch.tokens.dims(), [6, 20]);
    }
}

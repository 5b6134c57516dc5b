pub trait ProgressReporter: Send + Sync {
    fn update(&self, processed: usize, total: usize, prices_extracted: usize);
}

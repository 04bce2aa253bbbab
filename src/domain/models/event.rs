use super::Fragment;

pub enum Event {
    BackendFragments(Vec<Fragment>),
    BackendDone(),
    BackendError(String),
}

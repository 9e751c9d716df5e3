use crate::backend::BackendId;
use crate::error::CompressError;
use crate::format::ContainerType;
use crate::registry::Registry;

/// Default candidate order per container. Every candidate races; the order
/// only breaks ties between equally small results.
pub fn default_candidates(container: ContainerType) -> &'static [BackendId] {
    use BackendId::*;
    match container.selection_key() {
        ContainerType::Png => &[Codec, Optimizer, Tinify],
        ContainerType::Gif => &[Optimizer],
        ContainerType::Webp => &[Codec, Optimizer, Tinify],
        _ => &[Codec, Optimizer, Pixel, Tinify],
    }
}

/// Keep only the backends able to preserve metadata, in their original order.
pub fn retain_capable(registry: &Registry, backends: &[BackendId]) -> Vec<BackendId> {
    backends
        .iter()
        .copied()
        .filter(|id| registry.preserves_metadata(*id))
        .collect()
}

/// Ordered backends to race for a container type.
///
/// Fails with [`CompressError::NoCapableBackend`] when the candidate list is
/// empty, or when metadata must be preserved and no candidate can do it.
pub fn select_backends(
    registry: &Registry,
    container: ContainerType,
    preserve_metadata: bool,
) -> Result<Vec<BackendId>, CompressError> {
    let candidates = registry.candidates(container);
    if candidates.is_empty() {
        return Err(CompressError::NoCapableBackend { container });
    }
    if !preserve_metadata {
        return Ok(candidates.to_vec());
    }

    let capable = retain_capable(registry, candidates);
    if capable.is_empty() {
        return Err(CompressError::NoCapableBackend { container });
    }
    log::debug!("Metadata preservation requested, racing {:?}", capable);
    Ok(capable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_by_container() {
        use BackendId::*;
        assert_eq!(default_candidates(ContainerType::Png), &[Codec, Optimizer, Tinify]);
        assert_eq!(default_candidates(ContainerType::Gif), &[Optimizer]);
        assert_eq!(default_candidates(ContainerType::Jpeg), &[Codec, Optimizer, Pixel, Tinify]);
        assert_eq!(default_candidates(ContainerType::Unknown), default_candidates(ContainerType::Jpeg));
    }

    #[test]
    fn metadata_filter_drops_remote_backend() {
        let registry = Registry::with_builtin();
        let selected = select_backends(&registry, ContainerType::Png, true).unwrap();
        assert_eq!(selected, vec![BackendId::Codec, BackendId::Optimizer]);

        let selected = select_backends(&registry, ContainerType::Png, false).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn empty_candidate_list_fails_without_metadata_flag() {
        let registry = Registry::with_builtin().with_candidates(ContainerType::Gif, Vec::new());
        let err = select_backends(&registry, ContainerType::Gif, false).unwrap_err();
        assert!(matches!(
            err,
            CompressError::NoCapableBackend {
                container: ContainerType::Gif
            }
        ));
    }

    #[test]
    fn no_capable_candidate_fails_fast() {
        let registry = Registry::with_builtin().with_candidates(ContainerType::Webp, vec![BackendId::Tinify]);
        let err = select_backends(&registry, ContainerType::Webp, true).unwrap_err();
        assert!(matches!(
            err,
            CompressError::NoCapableBackend {
                container: ContainerType::Webp
            }
        ));
    }
}

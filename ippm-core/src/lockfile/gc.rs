use super::{Lock, PackageId, ROOT_IDENTITY};
use std::collections::{BTreeMap, BTreeSet};

/// Drops every record that is not reachable from the root through
/// dependency edges. The root itself is always kept.
pub fn gc(lock: &Lock) -> Lock {
    let reachable = reachable(lock);

    let packages: BTreeMap<_, _> = lock
        .packages
        .iter()
        .filter(|(identity, _)| reachable.contains(identity.as_str()))
        .map(|(identity, record)| (identity.clone(), record.clone()))
        .collect();

    let mut collected = Lock { packages };
    collected.root_mut();
    collected
}

pub fn reachable(lock: &Lock) -> BTreeSet<String> {
    let mut visited = BTreeSet::new();
    let mut stack = vec![ROOT_IDENTITY.to_string()];

    while let Some(identity) = stack.pop() {
        if !visited.insert(identity.clone()) {
            continue;
        }

        let Some(record) = lock.packages.get(&identity) else {
            continue;
        };

        for (name, version) in record.dependencies.iter() {
            let next = PackageId::new(name.as_str(), version.as_str()).identity();
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }

    visited
}

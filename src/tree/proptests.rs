// Copyright 2021 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Model-based property tests for [`NameTree`], checked against a
//! [`BTreeMap`] ordered by the same canonical name order.

use std::collections::BTreeMap;

use proptest::prelude::*;

use super::*;

const LABELS: &[&str] = &["a", "b", "c", "www", "Mail", "\\255"];

#[derive(Clone, Debug)]
enum Op {
    Add(Name, u32),
    Delete(Name, bool),
    Get(Name),
    Find(Name),
}

fn name_strategy() -> impl Strategy<Value = Name> + Clone {
    prop::collection::vec(prop::sample::select(LABELS), 1..=4).prop_map(|labels| {
        format!("{}.", labels.join("."))
            .parse()
            .expect("generated name is valid")
    })
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let name = name_strategy();
    let op = prop_oneof![
        45 => (name.clone(), any::<u32>()).prop_map(|(n, v)| Op::Add(n, v)),
        20 => (name.clone(), prop::bool::weighted(0.2)).prop_map(|(n, r)| Op::Delete(n, r)),
        15 => name.clone().prop_map(Op::Get),
        20 => name.prop_map(Op::Find),
    ];
    prop::collection::vec(op, 0..=300)
}

/// Returns the full names of all nodes, placeholders included.
fn node_names(tree: &NameTree<u32>) -> Vec<Name> {
    tree.iter_nodes().map(|id| tree.full_name(id)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut tree: NameTree<u32> = NameTree::with_options(TreeOptions {
            hash_bits: 4,
            ..TreeOptions::default()
        });
        let mut model: BTreeMap<Name, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(name, value) => {
                    let result = tree.add_name(&name, value);
                    if model.contains_key(&name) {
                        prop_assert_eq!(result.err(), Some(Error::Exists));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(name, value);
                    }
                }
                Op::Delete(name, recurse) => {
                    let result = tree.delete_name(&name, recurse);
                    prop_assert_eq!(result.is_ok(), model.contains_key(&name));
                    if result.is_ok() && recurse {
                        model.retain(|k, _| !k.eq_or_subdomain_of(&name));
                    } else {
                        model.remove(&name);
                    }
                }
                Op::Get(name) => {
                    prop_assert_eq!(tree.get(&name), model.get(&name));
                }
                Op::Find(name) => {
                    let mut chain = Chain::new();
                    let result = tree.find_node(&name, FindOptions::default(), Some(&mut chain));
                    let nodes = node_names(&tree);
                    let expected = if model.contains_key(&name) || nodes.contains(&name) {
                        Some(name.clone())
                    } else {
                        nodes.iter().filter(|n| **n < name).last().cloned()
                    };
                    prop_assert_eq!(matches!(result, FindResult::Found(_)), model.contains_key(&name));
                    prop_assert_eq!(chain.name(&tree), expected);
                }
            }

            if let Err(violation) = tree.check_invariants() {
                prop_assert!(false, "{}\n{}", violation, tree.text_dump());
            }
        }

        let forward: Vec<(Name, u32)> = tree.iter().map(|(n, v)| (n, *v)).collect();
        let expected: Vec<(Name, u32)> = model.iter().map(|(n, v)| (n.clone(), *v)).collect();
        prop_assert_eq!(&forward, &expected);

        let mut backward: Vec<(Name, u32)> = tree.iter().rev().map(|(n, v)| (n, *v)).collect();
        backward.reverse();
        prop_assert_eq!(backward, expected);
    }

    #[test]
    fn prop_full_names_round_trip(names in prop::collection::vec(name_strategy(), 1..=60)) {
        let mut tree = NameTree::new();
        for name in &names {
            let id = tree.add_node(name).unwrap().node();
            prop_assert_eq!(&tree.full_name(id), name);
        }
        for name in &names {
            let mut chain = Chain::new();
            let options = FindOptions { empty_data: true, ..FindOptions::default() };
            let result = tree.find_node(name, options, Some(&mut chain));
            prop_assert!(matches!(result, FindResult::Found(_)));
            let chain_name = chain.name(&tree);
            prop_assert_eq!(chain_name.as_ref(), Some(name));
        }

        // Forward and backward node walks mirror each other.
        let forward = node_names(&tree);
        let mut backward = Vec::new();
        let mut chain = Chain::new();
        let mut step = chain.last(&tree);
        while step.is_some() {
            backward.push(chain.name(&tree).unwrap());
            step = chain.prev(&tree);
        }
        backward.reverse();
        prop_assert_eq!(&forward, &backward);
        prop_assert!(forward.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

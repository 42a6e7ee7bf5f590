use crate::orchestration::arguments::ArgumentSet;
use crate::orchestration::selector::{ApiDescriptor, SelectionOutcome};
use serde::Serialize;
use serde_json::{Map, Value};

/// An argument waiting for a producer, with the chain of arguments that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArgument {
    pub name: String,
    pub ancestors: Vec<String>,
}

impl PendingArgument {
    pub fn is_cycle(&self) -> bool {
        self.ancestors.iter().any(|ancestor| *ancestor == self.name)
    }

    pub fn path(&self) -> Vec<String> {
        let mut path = self.ancestors.clone();
        path.push(self.name.clone());
        path
    }
}

/// LIFO of arguments awaiting a producer, scoped to one root resolution.
#[derive(Debug, Clone, Default)]
pub struct DependencyStack {
    entries: Vec<PendingArgument>,
}

impl DependencyStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_all(&mut self, names: Vec<String>, ancestors: &[String]) {
        for name in names {
            self.entries.push(PendingArgument {
                name,
                ancestors: ancestors.to_vec(),
            });
        }
    }

    pub fn pop(&mut self) -> Option<PendingArgument> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A producer discovered while draining the stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyStep {
    pub argument: String,
    pub producer: String,
    pub missing: Vec<String>,
}

/// The call chosen for execution in this iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub api: ApiDescriptor,
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DependencyResolution {
    Ready {
        call: ResolvedCall,
        trace: Vec<DependencyStep>,
    },
    ProducerNotFound {
        argument: String,
        trace: Vec<DependencyStep>,
    },
    Cycle {
        path: Vec<String>,
        trace: Vec<DependencyStep>,
    },
}

/// Drains the dependency stack depth-first, starting from the root API's missing arguments.
///
/// `select` finds a producer for an argument name; `resolve` returns the producer's
/// arguments. Only the producer found by the final pop is returned for execution; every
/// discovered producer is listed in the trace. An argument that reappears on its own ancestor
/// path is a cycle.
pub fn resolve_dependencies<E, S, R>(
    root: ApiDescriptor,
    root_arguments: &ArgumentSet,
    mut select: S,
    mut resolve: R,
) -> Result<DependencyResolution, E>
where
    S: FnMut(&str) -> Result<SelectionOutcome, E>,
    R: FnMut(&ApiDescriptor) -> Result<ArgumentSet, E>,
{
    let mut current = ResolvedCall {
        api: root,
        arguments: root_arguments.resolved(),
    };
    let mut trace = Vec::new();
    let mut stack = DependencyStack::new();
    stack.push_all(root_arguments.missing(), &[]);

    while let Some(pending) = stack.pop() {
        if pending.is_cycle() {
            return Ok(DependencyResolution::Cycle {
                path: pending.path(),
                trace,
            });
        }

        let producer = match select(&pending.name)? {
            SelectionOutcome::Found(producer) => producer,
            SelectionOutcome::NotFound => {
                return Ok(DependencyResolution::ProducerNotFound {
                    argument: pending.name,
                    trace,
                })
            }
        };

        let mut arguments = resolve(&producer)?;
        arguments.drop_optional_absent();
        let missing = arguments.missing();
        trace.push(DependencyStep {
            argument: pending.name.clone(),
            producer: producer.api_name.clone(),
            missing: missing.clone(),
        });
        stack.push_all(missing, &pending.path());

        current = ResolvedCall {
            api: producer,
            arguments: arguments.resolved(),
        };
    }

    Ok(DependencyResolution::Ready { call: current, trace })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::arguments::ArgumentResolution;
    use serde_json::json;
    use std::collections::HashMap;
    use std::convert::Infallible;

    fn api(name: &str) -> ApiDescriptor {
        ApiDescriptor {
            api_name: name.to_string(),
            data_source: format!("docs/{name}.json"),
        }
    }

    fn args(entries: &[(&str, Option<Value>)]) -> ArgumentSet {
        let mut set = ArgumentSet::new();
        for (name, value) in entries {
            let resolution = match value {
                Some(value) => ArgumentResolution::Resolved(value.clone()),
                None => ArgumentResolution::RequiredMissing,
            };
            set.insert(*name, resolution);
        }
        set
    }

    fn run(
        root_arguments: ArgumentSet,
        producers: &HashMap<&str, &str>,
        producer_arguments: &HashMap<&str, ArgumentSet>,
    ) -> DependencyResolution {
        let result: Result<_, Infallible> = resolve_dependencies(
            api("root"),
            &root_arguments,
            |argument| {
                Ok(match producers.get(argument) {
                    Some(name) => SelectionOutcome::Found(api(name)),
                    None => SelectionOutcome::NotFound,
                })
            },
            |producer| {
                Ok(producer_arguments
                    .get(producer.api_name.as_str())
                    .cloned()
                    .unwrap_or_default())
            },
        );
        match result {
            Ok(resolution) => resolution,
            Err(never) => match never {},
        }
    }

    #[test]
    fn no_missing_arguments_executes_the_root() {
        let resolution = run(
            args(&[("type", Some(json!(["issue"])))]),
            &HashMap::new(),
            &HashMap::new(),
        );
        match resolution {
            DependencyResolution::Ready { call, trace } => {
                assert_eq!(call.api.api_name, "root");
                assert_eq!(
                    call.arguments,
                    json!({"type": ["issue"]})
                        .as_object()
                        .cloned()
                        .unwrap_or_default()
                );
                assert!(trace.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn last_popped_producer_is_executed() {
        let producers = HashMap::from([("owned_by", "who_am_i"), ("sprint_id", "get_sprint")]);
        let resolution = run(
            args(&[("owned_by", None), ("sprint_id", None)]),
            &producers,
            &HashMap::new(),
        );
        match resolution {
            DependencyResolution::Ready { call, trace } => {
                // sprint_id was pushed last, so it is popped first.
                assert_eq!(call.api.api_name, "who_am_i");
                let order = trace.iter().map(|step| step.producer.as_str()).collect::<Vec<_>>();
                assert_eq!(order, vec!["get_sprint", "who_am_i"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_producers_are_traversed_depth_first() {
        let producers = HashMap::from([("part_id", "search_parts"), ("owner", "who_am_i")]);
        let producer_arguments =
            HashMap::from([("search_parts", args(&[("owner", None), ("q", Some(json!("x")))]))]);
        let resolution = run(args(&[("part_id", None)]), &producers, &producer_arguments);
        match resolution {
            DependencyResolution::Ready { call, trace } => {
                assert_eq!(call.api.api_name, "who_am_i");
                assert_eq!(trace.len(), 2);
                assert_eq!(trace[0].missing, vec!["owner".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_producer_aborts() {
        let resolution = run(args(&[("sprint_id", None)]), &HashMap::new(), &HashMap::new());
        assert!(matches!(
            resolution,
            DependencyResolution::ProducerNotFound { ref argument, .. } if argument == "sprint_id"
        ));
    }

    #[test]
    fn cycle_is_detected_instead_of_looping() {
        let producers = HashMap::from([("a", "make_a"), ("b", "make_b")]);
        let producer_arguments = HashMap::from([
            ("make_a", args(&[("b", None)])),
            ("make_b", args(&[("a", None)])),
        ]);
        let resolution = run(args(&[("a", None)]), &producers, &producer_arguments);
        match resolution {
            DependencyResolution::Cycle { path, trace } => {
                assert_eq!(path, vec!["a".to_string(), "b".to_string(), "a".to_string()]);
                assert_eq!(trace.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let producers = HashMap::from([
            ("left", "make_left"),
            ("right", "make_right"),
            ("user", "who_am_i"),
        ]);
        let producer_arguments = HashMap::from([
            ("make_left", args(&[("user", None)])),
            ("make_right", args(&[("user", None)])),
        ]);
        let resolution = run(
            args(&[("left", None), ("right", None)]),
            &producers,
            &producer_arguments,
        );
        match resolution {
            DependencyResolution::Ready { call, trace } => {
                assert_eq!(call.api.api_name, "who_am_i");
                assert_eq!(trace.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn selector_errors_propagate() {
        let result: Result<DependencyResolution, String> = resolve_dependencies(
            api("root"),
            &args(&[("x", None)]),
            |_| Err("model down".to_string()),
            |_| Ok(ArgumentSet::new()),
        );
        assert_eq!(result, Err("model down".to_string()));
    }
}

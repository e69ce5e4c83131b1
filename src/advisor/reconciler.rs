//! Apply polled advisory limits onto the caller's services

use super::model::LimitUpdateMap;
use crate::service::{LimitError, Service};
use std::collections::HashMap;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub applied: usize,
    pub unknown_services: Vec<String>,
    /// (service, limit) pairs the service did not recognize
    pub unknown_limits: Vec<(String, String)>,
}

/// Push every advisory value in `updates` onto the matching service.
///
/// Services and limits are visited in sorted order. Unknown services and
/// limits are logged and skipped; any other [`LimitError`] is returned.
pub fn apply<S: Service>(
    updates: &LimitUpdateMap,
    services: &mut HashMap<String, S>,
) -> Result<ReconcileSummary, LimitError> {
    tracing::debug!("Updating TA limits on all services");
    let mut summary = ReconcileSummary::default();

    let mut service_names: Vec<&str> = updates.service_names().collect();
    service_names.sort_unstable();

    for svc_name in service_names {
        let Some(service) = services.get_mut(svc_name) else {
            tracing::error!(
                "TrustedAdvisor returned check results for unknown service '{}'",
                svc_name
            );
            summary.unknown_services.push(svc_name.to_string());
            continue;
        };
        let Some(limits) = updates.service(svc_name) else {
            continue;
        };

        let mut limit_names: Vec<&String> = limits.keys().collect();
        limit_names.sort_unstable();

        for lim_name in limit_names {
            match service.set_advisory_limit(lim_name, limits[lim_name]) {
                Ok(()) => summary.applied += 1,
                Err(LimitError::UnknownLimit { .. }) => {
                    tracing::warn!(
                        "TrustedAdvisor returned check results for unknown limit '{}' (service {})",
                        lim_name,
                        svc_name
                    );
                    summary
                        .unknown_limits
                        .push((svc_name.to_string(), lim_name.clone()));
                }
                Err(err) => return Err(err),
            }
        }
    }

    tracing::info!(
        applied = summary.applied,
        unknown_services = summary.unknown_services.len(),
        unknown_limits = summary.unknown_limits.len(),
        "Done updating TA limits on all services"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::LimitedService;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every call and accepts everything except `reject`
    struct Recorder {
        name: String,
        log: Rc<RefCell<Vec<String>>>,
        reject: Option<String>,
    }

    impl Service for Recorder {
        fn set_advisory_limit(&mut self, limit: &str, value: i64) -> Result<(), LimitError> {
            self.log
                .borrow_mut()
                .push(format!("{}/{}={}", self.name, limit, value));
            if self.reject.as_deref() == Some(limit) {
                return Err(LimitError::UnknownLimit {
                    service: self.name.clone(),
                    limit: limit.to_string(),
                });
            }
            Ok(())
        }
    }

    fn recorder(name: &str, log: &Rc<RefCell<Vec<String>>>) -> Recorder {
        Recorder {
            name: name.to_string(),
            log: Rc::clone(log),
            reject: None,
        }
    }

    #[test]
    fn test_unknown_service_is_skipped() {
        let mut updates = LimitUpdateMap::new();
        updates.insert("Foo", "Widgets", 3);
        updates.insert("EC2", "Running On-Demand Instances", 40);

        let mut services = HashMap::new();
        services.insert(
            "EC2".to_string(),
            LimitedService::new("EC2").with_limit("Running On-Demand Instances", 20),
        );

        let summary = apply(&updates, &mut services).unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.unknown_services, vec!["Foo".to_string()]);
        assert_eq!(
            services["EC2"]
                .limit("Running On-Demand Instances")
                .unwrap()
                .advisory,
            Some(40)
        );
    }

    #[test]
    fn test_unknown_limit_skips_only_that_limit() {
        let mut updates = LimitUpdateMap::new();
        updates.insert("EC2", "Dedicated Hosts", 2);
        updates.insert("EC2", "Running On-Demand Instances", 40);
        updates.insert("VPC", "VPCs", 10);

        let mut services = HashMap::new();
        services.insert(
            "EC2".to_string(),
            LimitedService::new("EC2").with_limit("Running On-Demand Instances", 20),
        );
        services.insert("VPC".to_string(), LimitedService::new("VPC").with_limit("VPCs", 5));

        let summary = apply(&updates, &mut services).unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(
            summary.unknown_limits,
            vec![("EC2".to_string(), "Dedicated Hosts".to_string())]
        );
        assert_eq!(
            services["EC2"].limit("Running On-Demand Instances").unwrap().effective(),
            40
        );
        assert_eq!(services["VPC"].limit("VPCs").unwrap().effective(), 10);
    }

    #[test]
    fn test_services_and_limits_visited_in_sorted_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut updates = LimitUpdateMap::new();
        updates.insert("Zeta", "b", 2);
        updates.insert("Zeta", "a", 1);
        updates.insert("Alpha", "z", 26);
        updates.insert("Alpha", "m", 13);

        let mut services = HashMap::new();
        services.insert("Zeta".to_string(), recorder("Zeta", &log));
        services.insert("Alpha".to_string(), recorder("Alpha", &log));

        apply(&updates, &mut services).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["Alpha/m=13", "Alpha/z=26", "Zeta/a=1", "Zeta/b=2"]
        );
    }

    #[test]
    fn test_rejected_limit_does_not_stop_later_ones() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut updates = LimitUpdateMap::new();
        updates.insert("EC2", "a", 1);
        updates.insert("EC2", "b", 2);
        updates.insert("EC2", "c", 3);

        let mut ec2 = recorder("EC2", &log);
        ec2.reject = Some("b".to_string());
        let mut services = HashMap::new();
        services.insert("EC2".to_string(), ec2);

        let summary = apply(&updates, &mut services).unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_other_limit_errors_propagate() {
        let mut updates = LimitUpdateMap::new();
        updates.insert("EC2", "Instances", -5);
        let mut services = HashMap::new();
        services.insert(
            "EC2".to_string(),
            LimitedService::new("EC2").with_limit("Instances", 20),
        );

        let err = apply(&updates, &mut services).unwrap_err();
        assert!(matches!(err, LimitError::InvalidValue { value: -5, .. }));
    }

    #[test]
    fn test_empty_updates_touch_nothing() {
        let mut services = HashMap::new();
        services.insert("EC2".to_string(), LimitedService::new("EC2").with_limit("Instances", 20));
        let before = services.clone();

        let summary = apply(&LimitUpdateMap::new(), &mut services).unwrap();
        assert_eq!(summary, ReconcileSummary::default());
        assert_eq!(services, before);
    }
}

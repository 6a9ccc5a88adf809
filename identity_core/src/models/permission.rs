//! Permission syntax and the pure matching rule of spec section 4.D. These
//! functions hold no state and talk to no store — resolution (which loads roles and
//! populates caches) lives in `contracts::PermissionResolver` and its callers.

/// A parsed permission string. Either the global wildcard, a `resource.action` pair
/// (where action may itself be `*`), or the extended `resource:action:scope` form.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ParsedPermission<'a> {
  Wildcard,
  Dotted {
    resource: &'a str,
    action: &'a str,
  },
  Scoped {
    resource: &'a str,
    action: &'a str,
    scope: &'a str,
  },
}

fn parse(permission: &str) -> ParsedPermission<'_> {
  if permission == "*" {
    return ParsedPermission::Wildcard;
  }
  if let Some((resource, rest)) = permission.split_once(':') {
    let mut parts = rest.splitn(2, ':');
    let action = parts.next().unwrap_or("");
    let scope = parts.next().unwrap_or("");
    return ParsedPermission::Scoped {
      resource,
      action,
      scope,
    };
  }
  if let Some((resource, action)) = permission.split_once('.') {
    return ParsedPermission::Dotted { resource, action };
  }
  // A bare token with no separator is treated as a resource with an empty action;
  // it can only ever match itself.
  ParsedPermission::Dotted {
    resource: permission,
    action: "",
  }
}

/// Does a single held permission `p` satisfy the required permission `r`, per the
/// matching rule of spec section 4.D? Wildcards never cross the resource boundary.
fn satisfies(held: &str, required: &str) -> bool {
  if held == "*" {
    return true;
  }
  if held == required {
    return true;
  }

  match (parse(held), parse(required)) {
    (
      ParsedPermission::Dotted {
        resource: hr,
        action: ha,
      },
      ParsedPermission::Dotted {
        resource: rr,
        action: _,
      },
    ) => hr == rr && ha == "*",
    (
      ParsedPermission::Scoped {
        resource: hr,
        action: ha,
        scope: hs,
      },
      ParsedPermission::Scoped {
        resource: rr,
        action: ra,
        scope: rs,
      },
    ) => hr == rr && hs == rs && (ha == "*" || ha == ra),
    _ => false,
  }
}

/// `CheckPermission`: does the held permission set satisfy `required`?
pub fn check_permission(held: &[String], required: &str) -> bool {
  held.iter().any(|p| satisfies(p, required))
}

/// `CheckPermissions` (all of): every permission in `required` must be satisfied.
pub fn check_all_permissions(held: &[String], required: &[String]) -> bool {
  required.iter().all(|r| check_permission(held, r))
}

/// `CheckAnyPermission` (any of): at least one permission in `required` must be
/// satisfied.
pub fn check_any_permission(held: &[String], required: &[String]) -> bool {
  required.iter().any(|r| check_permission(held, r))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn super_admin_wildcard_matches_everything() {
    assert!(check_permission(&["*".to_string()], "billing.read"));
    assert!(check_permission(&["*".to_string()], "anything:at:all"));
  }

  #[test]
  fn resource_wildcard_matches_any_action_same_resource() {
    let held = vec!["user.*".to_string()];
    assert!(check_permission(&held, "user.read"));
    assert!(check_permission(&held, "user.write"));
    assert!(!check_permission(&held, "billing.read"));
  }

  #[test]
  fn exact_match_required() {
    let held = vec!["user.read".to_string()];
    assert!(check_permission(&held, "user.read"));
    assert!(!check_permission(&held, "user.write"));
  }

  #[test]
  fn scoped_form_respects_scope_and_action_wildcard() {
    let held = vec!["billing:*:tenant".to_string()];
    assert!(check_permission(&held, "billing:read:tenant"));
    assert!(!check_permission(&held, "billing:read:own"));
    assert!(!check_permission(&held, "invoices:read:tenant"));
  }

  #[test]
  fn wildcard_does_not_cross_resource_boundary() {
    let held = vec!["user.*".to_string()];
    assert!(!check_permission(&held, "billing.read"));
  }

  #[test]
  fn check_all_and_check_any() {
    let held = vec!["user.read".to_string(), "billing.read".to_string()];
    assert!(check_all_permissions(
      &held,
      &["user.read".to_string(), "billing.read".to_string()]
    ));
    assert!(!check_all_permissions(
      &held,
      &["user.read".to_string(), "billing.write".to_string()]
    ));
    assert!(check_any_permission(
      &held,
      &["billing.write".to_string(), "user.read".to_string()]
    ));
  }
}

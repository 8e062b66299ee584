//! Role-scoped authorization.
//!
//! Every check here is a pure function of the actor and the target, so the
//! reducer and the HTTP layer agree on who may do what.

use crate::error::TransitionError;
use crate::model::{Branch, LeaveRequest, Role, User, UserId};

/// Anything a manager can act upon.
pub trait Target {
    fn owner(&self) -> &UserId;
    fn branch(&self) -> Branch;
    /// Role of the record itself when it is a user record.
    fn personnel_role(&self) -> Option<Role>;
}

impl Target for LeaveRequest {
    fn owner(&self) -> &UserId {
        &self.user_id
    }

    fn branch(&self) -> Branch {
        self.branch
    }

    fn personnel_role(&self) -> Option<Role> {
        None
    }
}

impl Target for User {
    fn owner(&self) -> &UserId {
        &self.id
    }

    fn branch(&self) -> Branch {
        self.branch
    }

    fn personnel_role(&self) -> Option<Role> {
        Some(self.role)
    }
}

/// Whether `actor` may approve, reject, edit or administer `target`.
pub fn can_manage<T: Target + ?Sized>(actor: &User, target: &T) -> bool {
    if target.owner() == &actor.id || !actor.is_in_service() {
        return false;
    }

    match actor.role {
        Role::SuperAdmin => true,
        Role::OperationsManager => target.personnel_role() != Some(Role::SuperAdmin),
        Role::BranchManager => {
            target.branch() == actor.branch
                && !matches!(
                    target.personnel_role(),
                    Some(Role::SuperAdmin | Role::OperationsManager)
                )
        }
        Role::Staff => false,
    }
}

/// Same as [`can_manage`] but names the refusal.
pub fn ensure_can_manage<T: Target + ?Sized>(
    actor: &User,
    target: &T,
) -> Result<(), TransitionError> {
    if target.owner() == &actor.id && target.personnel_role().is_none() {
        return Err(TransitionError::SelfApproval);
    }
    if !actor.is_in_service() {
        return Err(TransitionError::InactiveAccount);
    }
    if can_manage(actor, target) {
        Ok(())
    } else {
        Err(TransitionError::Forbidden(format!(
            "{} cannot manage records of {}",
            actor.role,
            target.branch()
        )))
    }
}

/// Who may put a `role` account on the roster at `branch`.
/// `None` is self-registration from the sign-in screen.
pub fn authorize_role_assignment(
    actor: Option<&User>,
    role: Role,
    branch: Branch,
) -> Result<(), TransitionError> {
    let allowed = match actor.map(|a| (a.role, a.branch)) {
        None => role == Role::Staff,
        Some((Role::SuperAdmin, _)) => role != Role::SuperAdmin,
        Some((Role::OperationsManager, _)) => {
            matches!(role, Role::Staff | Role::BranchManager)
        }
        Some((Role::BranchManager, own)) => role == Role::Staff && branch == own,
        Some((Role::Staff, _)) => false,
    };

    if allowed {
        Ok(())
    } else {
        let by = actor.map_or_else(|| "self-registration".to_string(), |a| a.role.to_string());
        Err(TransitionError::Forbidden(format!(
            "{by} cannot assign {role} at {branch}"
        )))
    }
}

/// Audit trail, credential-reset queue and administrative PIN resets.
pub fn require_global(actor: &User) -> Result<(), TransitionError> {
    if !actor.is_in_service() {
        return Err(TransitionError::InactiveAccount);
    }
    if actor.role.is_global() {
        Ok(())
    } else {
        Err(TransitionError::Forbidden(format!(
            "{} is not a global administrator",
            actor.role
        )))
    }
}

/// Staff see their own requests, branch managers their branch, the
/// global tier everything.
pub fn can_view_request(actor: &User, request: &LeaveRequest) -> bool {
    if request.user_id == actor.id {
        return true;
    }
    match actor.role {
        Role::SuperAdmin | Role::OperationsManager => true,
        Role::BranchManager => request.branch == actor.branch,
        Role::Staff => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Department, LeaveStatus, LeaveType};
    use crate::testing::{leave, manager, staff};

    #[test]
    fn nobody_manages_their_own_request() {
        for role in [
            Role::SuperAdmin,
            Role::OperationsManager,
            Role::BranchManager,
            Role::Staff,
        ] {
            let actor = manager("Self", role, Branch::GodownHq);
            let own = leave(&actor, LeaveType::Annual, &["2025-06-10"], LeaveStatus::Pending);
            assert!(!can_manage(&actor, &own), "{role}");
            assert_eq!(
                ensure_can_manage(&actor, &own),
                Err(TransitionError::SelfApproval)
            );
        }
    }

    #[test]
    fn branch_manager_is_scoped_to_their_branch() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let local = staff("Otieno", Branch::Naivasha, Department::Sales);
        let remote = staff("Kamau", Branch::Gilgil, Department::Sales);

        let local_req = leave(&local, LeaveType::Annual, &["2025-06-10"], LeaveStatus::Pending);
        let remote_req = leave(&remote, LeaveType::Annual, &["2025-06-10"], LeaveStatus::Pending);

        assert!(can_manage(&bm, &local_req));
        assert!(!can_manage(&bm, &remote_req));
        assert!(can_manage(&bm, &local));
        assert!(!can_manage(&bm, &remote));
    }

    #[test]
    fn branch_manager_never_manages_global_tier_records() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::GodownHq);
        let om = manager("Achieng", Role::OperationsManager, Branch::GodownHq);
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        assert!(!can_manage(&bm, &om));
        assert!(!can_manage(&bm, &sa));

        // their leave is still branch business
        let om_req = leave(&om, LeaveType::Sick, &["2025-06-10"], LeaveStatus::Pending);
        assert!(can_manage(&bm, &om_req));
    }

    #[test]
    fn operations_manager_cannot_touch_super_admin_record() {
        let om = manager("Achieng", Role::OperationsManager, Branch::GodownHq);
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let far = staff("Kamau", Branch::Engineer, Department::Drivers);
        assert!(!can_manage(&om, &sa));
        assert!(can_manage(&om, &far));

        let sa_req = leave(&sa, LeaveType::Annual, &["2025-06-10"], LeaveStatus::Pending);
        assert!(can_manage(&om, &sa_req));
    }

    #[test]
    fn staff_and_inactive_actors_manage_nothing() {
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let peer = staff("Kamau", Branch::Naivasha, Department::Sales);
        assert!(!can_manage(&clerk, &peer));

        let mut sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        sa.is_blocked = true;
        assert!(!can_manage(&sa, &peer));
        assert_eq!(
            ensure_can_manage(&sa, &peer),
            Err(TransitionError::InactiveAccount)
        );
    }

    #[test]
    fn role_assignment_gating() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let om = manager("Achieng", Role::OperationsManager, Branch::GodownHq);
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);

        assert!(authorize_role_assignment(None, Role::Staff, Branch::Gilgil).is_ok());
        assert!(authorize_role_assignment(None, Role::BranchManager, Branch::Gilgil).is_err());

        assert!(authorize_role_assignment(Some(&sa), Role::OperationsManager, Branch::GodownHq).is_ok());
        assert!(authorize_role_assignment(Some(&sa), Role::SuperAdmin, Branch::GodownHq).is_err());

        assert!(authorize_role_assignment(Some(&om), Role::BranchManager, Branch::Gilgil).is_ok());
        assert!(authorize_role_assignment(Some(&om), Role::OperationsManager, Branch::GodownHq).is_err());

        assert!(authorize_role_assignment(Some(&bm), Role::Staff, Branch::Naivasha).is_ok());
        assert!(authorize_role_assignment(Some(&bm), Role::Staff, Branch::Gilgil).is_err());
        assert!(authorize_role_assignment(Some(&bm), Role::BranchManager, Branch::Naivasha).is_err());

        assert!(authorize_role_assignment(Some(&clerk), Role::Staff, Branch::Naivasha).is_err());
    }

    #[test]
    fn view_scoping() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let om = manager("Achieng", Role::OperationsManager, Branch::GodownHq);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let other = staff("Kamau", Branch::Gilgil, Department::Sales);

        let own = leave(&clerk, LeaveType::Annual, &["2025-06-10"], LeaveStatus::Pending);
        let far = leave(&other, LeaveType::Annual, &["2025-06-10"], LeaveStatus::Pending);

        assert!(can_view_request(&clerk, &own));
        assert!(!can_view_request(&clerk, &far));
        assert!(can_view_request(&bm, &own));
        assert!(!can_view_request(&bm, &far));
        assert!(can_view_request(&om, &far));
        assert!(require_global(&om).is_ok());
        assert!(require_global(&bm).is_err());
    }
}

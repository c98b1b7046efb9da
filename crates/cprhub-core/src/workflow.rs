//! Status state machines.
//!
//! Every status-bearing entity has a closed set of actions and an
//! exhaustive transition function. Handlers compute the target status
//! with [`Workflow::apply`] before touching storage; repositories then
//! persist the change as a compare-and-set on the prior status.

use std::fmt;

use crate::error::{CprError, CprResult};
use crate::models::course_request::CourseStatus;
use crate::models::invoice::InvoiceStatus;
use crate::models::payment::PaymentStatus;
use crate::models::payment_request::PaymentRequestStatus;
use crate::models::profile_change::ProfileChangeStatus;
use crate::models::timesheet::TimesheetStatus;
use crate::models::vendor_invoice::VendorInvoiceStatus;

pub trait Workflow: Copy + Eq + fmt::Display + 'static {
    type Action: Copy + fmt::Display + 'static;

    /// Entity name used in error messages.
    const ENTITY: &'static str;
    /// Every action of this workflow.
    const ACTIONS: &'static [Self::Action];

    /// Target status, or `None` if `action` is not allowed from `self`.
    fn next(self, action: Self::Action) -> Option<Self>;

    fn apply(self, action: Self::Action) -> CprResult<Self> {
        self.next(action).ok_or_else(|| CprError::InvalidTransition {
            entity: Self::ENTITY,
            from: self.to_string(),
            action: action.to_string(),
        })
    }

    fn can(self, action: Self::Action) -> bool {
        self.next(action).is_some()
    }

    /// No action leaves this status.
    fn is_terminal(self) -> bool {
        Self::ACTIONS.iter().all(|a| self.next(*a).is_none())
    }
}

string_enum! {
    pub enum CourseAction {
        Confirm => "confirm",
        Reassign => "reassign",
        Complete => "complete",
        Cancel => "cancel",
    }
}

impl Workflow for CourseStatus {
    type Action = CourseAction;
    const ENTITY: &'static str = "course request";
    const ACTIONS: &'static [CourseAction] = CourseAction::ALL;

    fn next(self, action: CourseAction) -> Option<Self> {
        use CourseAction as A;
        use CourseStatus as S;
        match (self, action) {
            (S::Pending, A::Confirm) => Some(S::Confirmed),
            (S::Confirmed, A::Reassign) => Some(S::Confirmed),
            (S::Confirmed, A::Complete) => Some(S::Completed),
            (S::Pending | S::Confirmed, A::Cancel) => Some(S::Cancelled),
            (S::Pending, A::Reassign | A::Complete)
            | (S::Confirmed, A::Confirm)
            | (S::Completed | S::Cancelled, _) => None,
        }
    }
}

string_enum! {
    pub enum InvoiceAction {
        Post => "post",
        /// Verified payments cover the total.
        Settle => "settle",
        Void => "void",
    }
}

impl Workflow for InvoiceStatus {
    type Action = InvoiceAction;
    const ENTITY: &'static str = "invoice";
    const ACTIONS: &'static [InvoiceAction] = InvoiceAction::ALL;

    fn next(self, action: InvoiceAction) -> Option<Self> {
        use InvoiceAction as A;
        use InvoiceStatus as S;
        match (self, action) {
            (S::Pending, A::Post) => Some(S::Posted),
            (S::Posted, A::Settle) => Some(S::Paid),
            (S::Pending | S::Posted, A::Void) => Some(S::Void),
            (S::Pending, A::Settle) | (S::Posted, A::Post) | (S::Paid | S::Void, _) => None,
        }
    }
}

string_enum! {
    pub enum PaymentAction {
        Verify => "verify",
        Reject => "reject",
    }
}

impl Workflow for PaymentStatus {
    type Action = PaymentAction;
    const ENTITY: &'static str = "payment";
    const ACTIONS: &'static [PaymentAction] = PaymentAction::ALL;

    fn next(self, action: PaymentAction) -> Option<Self> {
        use PaymentAction as A;
        use PaymentStatus as S;
        match (self, action) {
            (S::PendingVerification, A::Verify) => Some(S::Verified),
            (S::PendingVerification, A::Reject) => Some(S::Rejected),
            (S::Verified | S::Rejected, _) => None,
        }
    }
}

string_enum! {
    pub enum VendorInvoiceAction {
        Submit => "submit",
        Approve => "approve",
        Pay => "pay",
        Reject => "reject",
    }
}

impl Workflow for VendorInvoiceStatus {
    type Action = VendorInvoiceAction;
    const ENTITY: &'static str = "vendor invoice";
    const ACTIONS: &'static [VendorInvoiceAction] = VendorInvoiceAction::ALL;

    fn next(self, action: VendorInvoiceAction) -> Option<Self> {
        use VendorInvoiceAction as A;
        use VendorInvoiceStatus as S;
        match (self, action) {
            (S::PendingSubmission | S::Rejected, A::Submit) => Some(S::SubmittedToAdmin),
            (S::SubmittedToAdmin, A::Approve) => Some(S::SentToAccounting),
            (S::SentToAccounting, A::Pay) => Some(S::Paid),
            (S::SubmittedToAdmin | S::SentToAccounting, A::Reject) => Some(S::Rejected),
            (S::PendingSubmission | S::Rejected, A::Approve | A::Pay | A::Reject)
            | (S::SubmittedToAdmin, A::Submit | A::Pay)
            | (S::SentToAccounting, A::Submit | A::Approve)
            | (S::Paid, _) => None,
        }
    }
}

string_enum! {
    pub enum TimesheetAction {
        Approve => "approve",
        Reject => "reject",
        /// Instructor edits a rejected timesheet.
        Resubmit => "resubmit",
    }
}

impl Workflow for TimesheetStatus {
    type Action = TimesheetAction;
    const ENTITY: &'static str = "timesheet";
    const ACTIONS: &'static [TimesheetAction] = TimesheetAction::ALL;

    fn next(self, action: TimesheetAction) -> Option<Self> {
        use TimesheetAction as A;
        use TimesheetStatus as S;
        match (self, action) {
            (S::Pending, A::Approve) => Some(S::Approved),
            (S::Pending, A::Reject) => Some(S::Rejected),
            (S::Rejected, A::Resubmit) => Some(S::Pending),
            (S::Pending, A::Resubmit)
            | (S::Rejected, A::Approve | A::Reject)
            | (S::Approved, _) => None,
        }
    }
}

string_enum! {
    pub enum PaymentRequestAction {
        Approve => "approve",
        Pay => "pay",
        Reject => "reject",
    }
}

impl Workflow for PaymentRequestStatus {
    type Action = PaymentRequestAction;
    const ENTITY: &'static str = "payment request";
    const ACTIONS: &'static [PaymentRequestAction] = PaymentRequestAction::ALL;

    fn next(self, action: PaymentRequestAction) -> Option<Self> {
        use PaymentRequestAction as A;
        use PaymentRequestStatus as S;
        match (self, action) {
            (S::Pending, A::Approve) => Some(S::Approved),
            (S::Approved, A::Pay) => Some(S::Paid),
            (S::Pending | S::Approved, A::Reject) => Some(S::Rejected),
            (S::Pending, A::Pay) | (S::Approved, A::Approve) | (S::Paid | S::Rejected, _) => None,
        }
    }
}

string_enum! {
    pub enum ProfileChangeAction {
        Approve => "approve",
        Reject => "reject",
    }
}

impl Workflow for ProfileChangeStatus {
    type Action = ProfileChangeAction;
    const ENTITY: &'static str = "profile change";
    const ACTIONS: &'static [ProfileChangeAction] = ProfileChangeAction::ALL;

    fn next(self, action: ProfileChangeAction) -> Option<Self> {
        use ProfileChangeAction as A;
        use ProfileChangeStatus as S;
        match (self, action) {
            (S::Pending, A::Approve) => Some(S::Approved),
            (S::Pending, A::Reject) => Some(S::Rejected),
            (S::Approved | S::Rejected, _) => None,
        }
    }
}

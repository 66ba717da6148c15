//! Resource scope lookup.

use phf::phf_set;

/// Kinds that live outside of any namespace.
///
/// Kept in sync with the built-in API groups; custom resources are assumed to
/// be namespaced.
static CLUSTER_SCOPED_KINDS: phf::Set<&'static str> = phf_set! {
	"APIService",
	"CertificateSigningRequest",
	"ClusterIssuer",
	"ClusterRole",
	"ClusterRoleBinding",
	"ComponentStatus",
	"CSIDriver",
	"CSINode",
	"CustomResourceDefinition",
	"IngressClass",
	"MutatingWebhookConfiguration",
	"Namespace",
	"Node",
	"NodeMetrics",
	"PersistentVolume",
	"PodSecurityPolicy",
	"PriorityClass",
	"RuntimeClass",
	"SelfSubjectAccessReview",
	"SelfSubjectRulesReview",
	"StorageClass",
	"SubjectAccessReview",
	"TokenReview",
	"ValidatingAdmissionPolicy",
	"ValidatingAdmissionPolicyBinding",
	"ValidatingWebhookConfiguration",
	"VolumeAttachment",
};

/// Check if a Kubernetes kind is cluster-wide (not namespaced).
pub fn is_cluster_scoped_kind(kind: &str) -> bool {
	CLUSTER_SCOPED_KINDS.contains(kind)
}
